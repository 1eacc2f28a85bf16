//! # Keygate SDK
//!
//! Client-side core of the Keygate license activation service. Embed it in a
//! desktop application to decide whether the running process is entitled to
//! use the product, based on cryptographically signed activation records
//! bound to one product and one machine.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use keygate_sdk::{ActivationClient, Status, ValidationStrategy};
//!
//! fn main() -> keygate_sdk::Result<()> {
//!     let mut client = ActivationClient::new();
//!     let product_data = "..."; // base64 blob from the Keygate dashboard
//!     client.set_product_data(product_data)?;
//!
//!     // Fast, silent startup check against the local store.
//!     client.validate(ValidationStrategy::LocalValidOnly)?;
//!
//!     if client.status() != Status::Valid {
//!         // Ask the user for their license, then:
//!         client.activate("user@example.com", "ABCD-EFGH-IJKL")?;
//!     }
//!
//!     // Periodically refresh stale activations.
//!     client.validate(ValidationStrategy::Online)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design
//!
//! - **Offline-first**: validation runs against a local SQLite store of
//!   signed activations; the server is only consulted for activations that
//!   are stale or close to their lease end.
//! - **Machine-bound**: activations carry a hashed machine UID and verify
//!   with the product's embedded ed25519 key, so a copied database confers
//!   nothing on another machine.
//! - **Air-gap friendly**: activation requests can be written to an
//!   encrypted file, carried to an online machine, and the response
//!   installed from a file.
//!
//! The client is synchronous and single-threaded by design; see
//! [`ActivationClient`] for the threading contract.

pub mod activation;
pub mod client;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod license;
pub mod machine;
pub mod messages;
pub mod product;
pub mod rest;
pub mod store;

pub use activation::{Activation, Status};
pub use client::{ActivationClient, Subscriber, Subscription, TrialStatus, ValidationStrategy};
pub use error::{Error, Result};
pub use license::LicenseType;
pub use messages::{ActivationRequest, OfflineRequest, TrialRequest};
pub use product::ProductData;
pub use rest::{Response, RestClient};
pub use store::{ActivationStore, StoreOptions};

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
