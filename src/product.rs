//! Product configuration embedded in the host application.

use serde::Deserialize;

use crate::encoding::{self, b64};
use crate::error::{Error, Result};

/// Immutable product configuration, issued with the product and handed to
/// [`set_product_data`](crate::ActivationClient::set_product_data) as a
/// base64-encoded JSON document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductData {
    pub organisation_name: String,
    pub product_name: String,
    pub product_uid: String,
    /// Public half of the server's ed25519 signing keypair (32 bytes).
    #[serde(with = "b64")]
    pub verifying_key: Vec<u8>,
    /// Recipient key for sealed-box encryption of offline request fields
    /// (32 bytes).
    #[serde(with = "b64")]
    pub crypto_public_key: Vec<u8>,
    pub primary_public_server_address: String,
    /// Reserved for failover; not consulted by the SDK yet.
    pub secondary_public_server_address: String,
}

impl ProductData {
    /// Decodes product data from its base64-encoded JSON form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        if encoded.is_empty() {
            return Err(Error::Config("product data is empty".into()));
        }

        let json = encoding::decode(encoded)
            .map_err(|e| Error::Config(format!("product data is not valid base64: {e}")))?;

        serde_json::from_slice(&json)
            .map_err(|e| Error::Config(format!("product data is not valid JSON: {e}")))
    }
}
