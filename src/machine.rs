//! Stable machine identity and default device info.
//!
//! The machine UID is a BLAKE2b-256 hash of a platform-unique identifier, so
//! raw hardware ids never leave the machine or reach the server.

use crate::crypto;
use crate::encoding;
use crate::error::{Error, Result};

/// A privacy-preserving identifier for this machine, stable across reboots.
pub fn machine_uid() -> Result<Vec<u8>> {
    let raw = raw_machine_id()?;
    if raw.is_empty() {
        return Err(Error::Input("failed to get unique machine id".into()));
    }
    Ok(crypto::generic_hash(raw.as_bytes()).to_vec())
}

/// The machine UID in the base64 form the wire formats carry.
pub fn machine_uid_base64() -> Result<String> {
    Ok(encoding::encode(machine_uid()?))
}

/// A short human-readable description of this machine. Attached to
/// activation requests so users can tell their seats apart; the server does
/// not interpret it.
pub fn default_device_info() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{host}, {}, {}", std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(target_os = "linux")]
fn raw_machine_id() -> Result<String> {
    // systemd first, then the dbus fallback.
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
    }

    Err(Error::Input("failed to get unique machine id".into()))
}

#[cfg(target_os = "macos")]
fn raw_machine_id() -> Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .map_err(|e| Error::Input(format!("failed to run ioreg: {e}")))?;

    let output = String::from_utf8_lossy(&output.stdout);

    // Prefer the serial number, fall back to the hardware UUID.
    for key in ["IOPlatformSerialNumber", "IOPlatformUUID"] {
        for line in output.lines() {
            if !line.contains(key) {
                continue;
            }
            if let Some(value) = line.split('"').nth(3) {
                if !value.is_empty() {
                    return Ok(value.to_string());
                }
            }
        }
    }

    Err(Error::Input("failed to get unique machine id".into()))
}

#[cfg(target_os = "windows")]
fn raw_machine_id() -> Result<String> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let crypto = hklm
        .open_subkey("SOFTWARE\\Microsoft\\Cryptography")
        .map_err(|e| Error::Input(format!("failed to open Cryptography registry key: {e}")))?;

    crypto
        .get_value("MachineGuid")
        .map_err(|e| Error::Input(format!("failed to read MachineGuid: {e}")))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn raw_machine_id() -> Result<String> {
    Err(Error::Input(
        "machine id is not supported on this platform".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_uid_is_stable_and_hashed() {
        if let Ok(uid) = machine_uid() {
            assert_eq!(uid.len(), crypto::HASH_BYTES);
            assert_eq!(machine_uid().unwrap(), uid);
            // The raw platform id must not appear in the UID.
            let raw = raw_machine_id().unwrap();
            assert_ne!(uid, raw.as_bytes());
        }
    }

    #[test]
    fn default_device_info_has_three_parts() {
        let info = default_device_info();
        assert_eq!(info.split(", ").count(), 3);
    }
}
