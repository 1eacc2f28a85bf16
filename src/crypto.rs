//! Thin wrappers around the cryptographic primitives the SDK relies on.
//!
//! All operations are pure functions; key material is supplied by the caller
//! (it ships embedded in product data) and is never generated here.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, VerifyingKey};
use rand::rngs::OsRng;
use sha2::Sha512;

use crate::error::{Error, Result};

/// Output width of [`generic_hash`].
pub const HASH_BYTES: usize = 32;

/// Byte length of a sealed-box recipient key.
pub const SEAL_KEY_BYTES: usize = 32;

/// Ciphertext overhead added by [`seal`]: an ephemeral X25519 public key plus
/// the Poly1305 tag.
pub const SEAL_OVERHEAD: usize = 48;

/// Byte length of an ed25519 verifying key.
pub const VERIFY_KEY_BYTES: usize = 32;

/// Byte length of a detached ed25519 signature.
pub const SIGNATURE_BYTES: usize = 64;

type Blake2b256 = Blake2b<U32>;

/// BLAKE2b-256 of `data`, matching libsodium's `crypto_generichash` defaults.
pub fn generic_hash(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encrypts `plaintext` to `recipient_key` as an anonymous sealed box.
///
/// The ciphertext is `plaintext.len() + SEAL_OVERHEAD` bytes and can only be
/// opened by the holder of the matching secret key.
pub fn seal(plaintext: &[u8], recipient_key: &[u8]) -> Result<Vec<u8>> {
    let key: [u8; SEAL_KEY_BYTES] = recipient_key
        .try_into()
        .map_err(|_| Error::Crypto(format!("invalid key length: {}", recipient_key.len())))?;

    crypto_box::PublicKey::from_bytes(key)
        .seal(&mut OsRng, plaintext)
        .map_err(|_| Error::Crypto("failed to seal data".into()))
}

/// Verifies a detached signature over a message assembled from `segments`.
///
/// The server signs with libsodium's multi-part API, which is Ed25519ph: the
/// message is pre-hashed with SHA-512 before signing. The segments are fed
/// through the digest here in the same order.
///
/// A key or signature of the wrong shape verifies as `false` rather than
/// erroring.
pub fn verify_detached(segments: &[&[u8]], signature: &[u8], verifying_key: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; VERIFY_KEY_BYTES]>::try_from(verifying_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    let mut digest = Sha512::new();
    for segment in segments {
        digest.update(segment);
    }

    key.verify_prehashed(digest, None, &signature).is_ok()
}
