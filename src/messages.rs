//! Request payloads sent to the license server, online and offline.

use serde::{Deserialize, Serialize};

/// Body POSTed to `/activate`.
///
/// In the offline envelope the same shape is reused with `email_address`,
/// `license_key` and `device_info` holding base64-encoded sealed-box
/// ciphertexts instead of plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub product_uid: String,
    /// Machine UID, base64-encoded.
    pub machine_uid: String,
    pub email_address: String,
    pub license_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

/// Body POSTed to `/activate-trial`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRequest {
    pub product_uid: String,
    /// Machine UID, base64-encoded.
    pub machine_uid: String,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

/// Portable request for air-gapped machines, shipped to a separate, online
/// machine as a single JSON file.
///
/// `email_address`, `license_key` and `device_info` are sealed to the
/// product's encryption key and base64-encoded before the envelope is
/// serialized; only the product and machine identifiers travel in the clear.
/// The variant name is the JSON tag, so the on-disk shape is exactly
/// `{"ActivationRequest": {...}}` or `{"TrialRequest": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfflineRequest {
    ActivationRequest(ActivationRequest),
    TrialRequest(TrialRequest),
}
