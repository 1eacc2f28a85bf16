//! Error types for the Keygate SDK.

use thiserror::Error;

use crate::activation::Status;

/// SDK-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted before `set_product_data` succeeded.
    #[error("Product data not set")]
    ProductDataNotSet,

    /// Product data was missing, empty, or failed to decode.
    #[error("Invalid product data: {0}")]
    Config(String),

    /// Caller-supplied input was unusable (empty email, unreadable file, ...).
    #[error("{0}")]
    Input(String),

    /// The server could not be reached at all.
    #[error("Failed to reach activation server: {0}")]
    Transport(String),

    /// The server replied with a non-2xx status.
    #[error("{body} ({status})")]
    Server { status: u16, body: String },

    /// A cryptographic primitive failed (wrong key length, seal failure).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The activations database has not been opened yet.
    #[error("Database not open")]
    StoreNotOpen,

    /// Local activations database failure.
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An activation did not validate against the current product and machine.
    #[error("Activation failed: {0}")]
    Validation(Status),

    /// An offline request file was supplied where a response file was expected.
    #[error("This is a request file. Please install a response file.")]
    RequestFileGiven,
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;
