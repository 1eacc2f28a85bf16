//! Behavior of the local activation store against real database files.

mod common;

use keygate_sdk::{ActivationStore, Error, LicenseType, StoreOptions};
use tempfile::tempdir;

use common::{signed_activation, unsigned_activation, DAY_MS};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn open_store(path: &std::path::Path) -> ActivationStore {
    let mut store = ActivationStore::new();
    store
        .open(StoreOptions {
            database_file: path.to_path_buf(),
        })
        .expect("store opens");
    store
}

#[test]
fn open_creates_file_and_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Example Audio").join("activations.db");

    let store = open_store(&path);
    assert!(path.exists());
    assert_eq!(store.database_file(), Some(path.as_path()));
}

#[test]
fn reopen_same_path_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("activations.db");

    let mut store = open_store(&path);
    store
        .save(&unsigned_activation(b"h1", None, None, LicenseType::Trial))
        .unwrap();

    store
        .open(StoreOptions {
            database_file: path.clone(),
        })
        .unwrap();

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn reopen_with_new_path_switches_databases() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.db");
    let second = dir.path().join("second.db");

    let mut store = open_store(&first);
    store
        .save(&unsigned_activation(b"h1", None, None, LicenseType::Trial))
        .unwrap();

    store
        .open(StoreOptions {
            database_file: second.clone(),
        })
        .unwrap();
    assert_eq!(store.database_file(), Some(second.as_path()));

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn unopened_store_reports_not_open() {
    let store = ActivationStore::new();
    assert!(matches!(
        store.list_for(common::PRODUCT_UID, &common::machine_uid()),
        Err(Error::StoreNotOpen)
    ));
}

#[test]
fn save_is_an_upsert_by_hash() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir.path().join("activations.db"));
    let now = now_millis();

    store
        .save(&unsigned_activation(b"h1", Some(now + DAY_MS), None, LicenseType::Trial))
        .unwrap();
    store
        .save(&unsigned_activation(b"h1", Some(now + 2 * DAY_MS), None, LicenseType::Trial))
        .unwrap();

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].expires_at(), Some(now + 2 * DAY_MS));
}

#[test]
fn round_trip_preserves_all_fields() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir.path().join("activations.db"));
    let now = now_millis();

    let activation =
        signed_activation(b"h1", Some(now + DAY_MS), Some(now + 30 * DAY_MS), LicenseType::Subscription);
    store.save(&activation).unwrap();

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(rows, vec![activation]);
}

#[test]
fn delete_removes_only_the_given_hash() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir.path().join("activations.db"));

    store
        .save(&unsigned_activation(b"h1", None, None, LicenseType::Trial))
        .unwrap();
    store
        .save(&unsigned_activation(b"h2", None, None, LicenseType::Trial))
        .unwrap();

    store.delete(b"h1").unwrap();

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hash(), &b"h2"[..]);
}

#[test]
fn delete_all_for_counts_and_respects_the_filter() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir.path().join("activations.db"));

    store
        .save(&unsigned_activation(b"h1", None, None, LicenseType::Trial))
        .unwrap();
    store
        .save(&unsigned_activation(b"h2", None, None, LicenseType::Perpetual))
        .unwrap();

    // Same product, different machine: must survive.
    let other_machine = keygate_sdk::Activation::new(
        b"h3".to_vec(),
        common::PRODUCT_UID.to_string(),
        vec![0xCD; 32],
        None,
        None,
        LicenseType::Trial,
        Vec::new(),
    );
    store.save(&other_machine).unwrap();

    let removed = store
        .delete_all_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(removed, 2);

    assert!(store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap()
        .is_empty());
    assert_eq!(
        store.list_for(common::PRODUCT_UID, &[0xCD; 32]).unwrap().len(),
        1
    );
}

#[test]
fn list_trials_filters_on_license_type() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir.path().join("activations.db"));

    store
        .save(&unsigned_activation(b"trial", None, None, LicenseType::Trial))
        .unwrap();
    store
        .save(&unsigned_activation(b"full", None, None, LicenseType::Perpetual))
        .unwrap();

    let trials = store
        .list_trials_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].license_type(), LicenseType::Trial);
}

#[test]
fn list_needing_update_selects_imminent_stale_or_all() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("activations.db");
    let store = open_store(&path);
    let now = now_millis();

    // Lease ends within 24 hours: due.
    store
        .save(&unsigned_activation(b"imminent", Some(now + DAY_MS / 2), None, LicenseType::Trial))
        .unwrap();
    // Already expired: still due.
    store
        .save(&unsigned_activation(b"expired", Some(now - DAY_MS), None, LicenseType::Trial))
        .unwrap();
    // Fresh copy, lease far out: not due.
    store
        .save(&unsigned_activation(b"fresh", Some(now + 10 * DAY_MS), None, LicenseType::Trial))
        .unwrap();
    // No lease at all, fresh copy: not due.
    store
        .save(&unsigned_activation(b"perpetual", None, None, LicenseType::Perpetual))
        .unwrap();
    // No lease but a stale local copy: due.
    store
        .save(&unsigned_activation(b"stale", None, None, LicenseType::Perpetual))
        .unwrap();
    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "UPDATE activations SET last_updated_at = ?1 WHERE hash = ?2",
        rusqlite::params![now - 2 * DAY_MS, &b"stale"[..]],
    )
    .unwrap();

    let due = store
        .list_needing_update(common::PRODUCT_UID, &common::machine_uid(), false)
        .unwrap();
    let mut due_hashes: Vec<&[u8]> = due.iter().map(|a| a.hash()).collect();
    due_hashes.sort_unstable();
    assert_eq!(due_hashes, vec![&b"expired"[..], &b"imminent"[..], &b"stale"[..]]);

    let all = store
        .list_needing_update(common::PRODUCT_UID, &common::machine_uid(), true)
        .unwrap();
    assert_eq!(all.len(), 5);
}

#[test]
fn apply_refresh_upserts_and_prunes_in_one_pass() {
    let dir = tempdir().unwrap();
    let mut store = open_store(&dir.path().join("activations.db"));
    let now = now_millis();

    let h1 = unsigned_activation(b"h1", Some(now + DAY_MS), None, LicenseType::Trial);
    let h2 = unsigned_activation(b"h2", Some(now + DAY_MS), None, LicenseType::Trial);
    store.save(&h1).unwrap();
    store.save(&h2).unwrap();

    // Server re-issues h1 with a longer lease and drops h2.
    let h1_renewed = unsigned_activation(b"h1", Some(now + 30 * DAY_MS), None, LicenseType::Trial);
    store
        .apply_refresh(&[h1_renewed.clone()], &[h1.clone(), h2.clone()])
        .unwrap();

    let rows = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap();
    assert_eq!(rows, vec![h1_renewed]);

    // A response can also introduce activations the client has never seen.
    let h3 = unsigned_activation(b"h3", Some(now + DAY_MS), None, LicenseType::Subscription);
    store
        .apply_refresh(&[rows[0].clone(), h3.clone()], &rows.clone())
        .unwrap();

    let mut hashes: Vec<Vec<u8>> = store
        .list_for(common::PRODUCT_UID, &common::machine_uid())
        .unwrap()
        .iter()
        .map(|a| a.hash().to_vec())
        .collect();
    hashes.sort_unstable();
    assert_eq!(hashes, vec![b"h1".to_vec(), b"h3".to_vec()]);
}
