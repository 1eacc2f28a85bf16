//! Durable local storage for activations.
//!
//! A single SQLite database file holds every activation the server has
//! issued for this machine, keyed by the server-generated activation hash.
//! One process-local connection; contention with other processes holding the
//! same file is absorbed by the busy timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, Row};

use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::license::LicenseType;

/// How long a connection waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_millis(1000);

/// Activations expiring within this window, or not refreshed for longer than
/// it, are due for a server round-trip.
// TODO: make this configurable as part of the activation returned by the server.
pub(crate) const ONLINE_CHECK_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Columns selected for every activation read.
const ACTIVATION_COLS: &str =
    "hash, product_uid, machine_uid, expires_at, license_expires_at, license_type, signature";

/// Options controlling where the store lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub database_file: PathBuf,
}

trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

impl FromRow for Activation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Activation::new(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get::<_, LicenseType>(5)?,
            row.get(6)?,
        ))
    }
}

fn query_all<T: FromRow, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Keyed table of activations backed by a SQLite file.
#[derive(Default)]
pub struct ActivationStore {
    conn: Option<Connection>,
    options: Option<StoreOptions>,
}

impl ActivationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the database at the configured path, creating the file and its
    /// parent directory if needed, and applies the schema migration.
    /// Reopening with unchanged options is a no-op; a changed path closes
    /// the current handle first.
    pub fn open(&mut self, options: StoreOptions) -> Result<()> {
        if self.conn.is_some() && self.options.as_ref() == Some(&options) {
            return Ok(());
        }

        self.conn = None;

        if let Some(parent) = options.database_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(&options.database_file)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate(&conn)?;

        tracing::debug!(file = %options.database_file.display(), "activations database open");

        self.conn = Some(conn);
        self.options = Some(options);
        Ok(())
    }

    /// Path of the currently open database file, if any.
    pub fn database_file(&self) -> Option<&Path> {
        self.options.as_ref().map(|o| o.database_file.as_path())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::StoreNotOpen)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(Error::StoreNotOpen)
    }

    /// Inserts or replaces the activation keyed by its hash, stamping
    /// `last_updated_at` with the current time.
    pub fn save(&self, activation: &Activation) -> Result<()> {
        save_with(self.conn()?, activation)
    }

    /// Deletes the activation with the given hash. Unknown hashes are a
    /// no-op.
    pub fn delete(&self, hash: &[u8]) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM activations WHERE hash = ?1", params![hash])?;
        Ok(())
    }

    /// Deletes every activation for the given product and machine, returning
    /// the number of rows removed.
    pub fn delete_all_for(&self, product_uid: &str, machine_uid: &[u8]) -> Result<usize> {
        Ok(self.conn()?.execute(
            "DELETE FROM activations WHERE product_uid = ?1 AND machine_uid = ?2",
            params![product_uid, machine_uid],
        )?)
    }

    /// All activations for the given product and machine.
    pub fn list_for(&self, product_uid: &str, machine_uid: &[u8]) -> Result<Vec<Activation>> {
        query_all(
            self.conn()?,
            &format!(
                "SELECT {ACTIVATION_COLS} FROM activations
                  WHERE product_uid = ?1 AND machine_uid = ?2"
            ),
            params![product_uid, machine_uid],
        )
    }

    /// Trial activations for the given product and machine.
    pub fn list_trials_for(&self, product_uid: &str, machine_uid: &[u8]) -> Result<Vec<Activation>> {
        query_all(
            self.conn()?,
            &format!(
                "SELECT {ACTIVATION_COLS} FROM activations
                  WHERE product_uid = ?1 AND machine_uid = ?2 AND license_type = ?3"
            ),
            params![product_uid, machine_uid, LicenseType::Trial],
        )
    }

    /// Activations due for a server refresh: lease expiring within the check
    /// interval (including already expired), or local copy older than the
    /// interval, or all of them when `force_all` is set.
    pub fn list_needing_update(
        &self,
        product_uid: &str,
        machine_uid: &[u8],
        force_all: bool,
    ) -> Result<Vec<Activation>> {
        let now = crate::now_millis();

        // No license_expires_at term: the server guarantees expires_at never
        // outlasts it.
        query_all(
            self.conn()?,
            &format!(
                "SELECT {ACTIVATION_COLS} FROM activations
                  WHERE product_uid = ?1 AND machine_uid = ?2
                    AND (expires_at < ?3 OR last_updated_at < ?4 OR ?5)"
            ),
            params![
                product_uid,
                machine_uid,
                now + ONLINE_CHECK_INTERVAL_MS,
                now - ONLINE_CHECK_INTERVAL_MS,
                force_all
            ],
        )
    }

    /// Applies a refresh response: every returned activation is upserted,
    /// then every candidate the server omitted is deleted as de-provisioned.
    /// Runs in one transaction so a crash cannot leave half a refresh
    /// behind.
    pub fn apply_refresh(&mut self, response: &[Activation], candidates: &[Activation]) -> Result<()> {
        let tx = self.conn_mut()?.transaction()?;

        for activation in response {
            save_with(&tx, activation)?;
        }

        for candidate in candidates {
            let kept = response.iter().any(|a| a.hash() == candidate.hash());
            if !kept {
                tracing::warn!(
                    license_type = %candidate.license_type(),
                    "activation no longer provisioned by the server, deleting local copy"
                );
                tx.execute(
                    "DELETE FROM activations WHERE hash = ?1",
                    params![candidate.hash()],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn save_with(conn: &Connection, activation: &Activation) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activations (
            hash, product_uid, machine_uid, expires_at, license_expires_at,
            last_updated_at, license_type, signature)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            activation.hash(),
            activation.product_uid(),
            activation.machine_uid(),
            activation.expires_at(),
            activation.license_expires_at(),
            crate::now_millis(),
            activation.license_type(),
            activation.signature(),
        ],
    )?;
    Ok(())
}

/// Idempotent schema migration; safe to run on every open.
fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS activations (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            hash               BLOB UNIQUE NOT NULL,
            product_uid        TEXT        NOT NULL,
            machine_uid        BLOB        NOT NULL,
            expires_at         INTEGER,
            license_expires_at INTEGER,
            last_updated_at    INTEGER     NOT NULL,
            license_type       TEXT        NOT NULL,
            signature          BLOB        NOT NULL
        )",
        [],
    )?;
    Ok(())
}
