//! Shared fixtures for integration tests.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha512};

use keygate_sdk::encoding;
use keygate_sdk::{Activation, LicenseType};

pub const PRODUCT_UID: &str = "com.example.synth";
pub const ORGANISATION: &str = "Example Audio";

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// The machine UID every test client is pinned to.
pub fn machine_uid() -> Vec<u8> {
    vec![0xAB; 32]
}

/// Deterministic server signing key for tests.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[17u8; 32])
}

pub fn verifying_key() -> Vec<u8> {
    signing_key().verifying_key().to_bytes().to_vec()
}

/// Signs the canonical activation layout: hash, product uid and machine uid
/// back to back, each present expiry as a big-endian i64, then the license
/// type name. Built here independently of the crate so the wire contract is
/// pinned from both sides.
pub fn sign_canonical(
    hash: &[u8],
    product_uid: &str,
    machine_uid: &[u8],
    expires_at: Option<i64>,
    license_expires_at: Option<i64>,
    license_type: LicenseType,
    signing_key: &SigningKey,
) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(hash);
    message.extend_from_slice(product_uid.as_bytes());
    message.extend_from_slice(machine_uid);
    if let Some(expires_at) = expires_at {
        message.extend_from_slice(&expires_at.to_be_bytes());
    }
    if let Some(license_expires_at) = license_expires_at {
        message.extend_from_slice(&license_expires_at.to_be_bytes());
    }
    message.extend_from_slice(license_type.as_str().as_bytes());

    let mut digest = Sha512::new();
    digest.update(&message);

    signing_key
        .sign_prehashed(digest, None)
        .expect("signing cannot fail")
        .to_bytes()
        .to_vec()
}

/// A correctly signed activation for the standard test product and machine.
pub fn signed_activation(
    hash: &[u8],
    expires_at: Option<i64>,
    license_expires_at: Option<i64>,
    license_type: LicenseType,
) -> Activation {
    let signature = sign_canonical(
        hash,
        PRODUCT_UID,
        &machine_uid(),
        expires_at,
        license_expires_at,
        license_type,
        &signing_key(),
    );

    Activation::new(
        hash.to_vec(),
        PRODUCT_UID.to_string(),
        machine_uid(),
        expires_at,
        license_expires_at,
        license_type,
        signature,
    )
}

/// An activation with an empty signature, which can never validate.
pub fn unsigned_activation(
    hash: &[u8],
    expires_at: Option<i64>,
    license_expires_at: Option<i64>,
    license_type: LicenseType,
) -> Activation {
    Activation::new(
        hash.to_vec(),
        PRODUCT_UID.to_string(),
        machine_uid(),
        expires_at,
        license_expires_at,
        license_type,
        Vec::new(),
    )
}

/// Base64-encoded product data JSON pointing at `server_address`.
pub fn product_data_base64(server_address: &str) -> String {
    let json = serde_json::json!({
        "organisation_name": ORGANISATION,
        "product_name": "Example Synth",
        "product_uid": PRODUCT_UID,
        "verifying_key": encoding::encode(verifying_key()),
        "crypto_public_key": encoding::encode([3u8; 32]),
        "primary_public_server_address": server_address,
        "secondary_public_server_address": server_address,
    });
    encoding::encode(json.to_string())
}
