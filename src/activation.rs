//! The activation record: a server-signed proof that this machine may run
//! this product for a bounded (or unbounded) period.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::crypto;
use crate::encoding::b64;
use crate::license::LicenseType;

/// Outcome of validating an activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    /// Not yet validated.
    #[default]
    Undefined,
    /// The client has no activation selected at all.
    NoActivationLoaded,
    InvalidSignature,
    InvalidProductUid,
    InvalidMachineUid,
    LicenseExpired,
    ActivationExpired,
    Valid,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::NoActivationLoaded => "NoActivationLoaded",
            Self::InvalidSignature => "InvalidSignature",
            Self::InvalidProductUid => "InvalidProductUid",
            Self::InvalidMachineUid => "InvalidMachineUid",
            Self::LicenseExpired => "LicenseExpired",
            Self::ActivationExpired => "ActivationExpired",
            Self::Valid => "Valid",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed activation bound to one product and one machine.
///
/// Instances come from the server (activation and refresh responses), from
/// response files, or from rows in the local store. The wire field names and
/// the canonical signing input are both server contracts and must not drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activation {
    /// Server-generated identifier, derived from email address and license
    /// key. Primary key in the local store.
    #[serde(rename = "activation_hash", with = "b64")]
    hash: Vec<u8>,
    product_uid: String,
    #[serde(with = "b64")]
    machine_uid: Vec<u8>,
    /// Lease end in milliseconds since the epoch; `None` means the lease
    /// itself never expires.
    expires_at: Option<i64>,
    /// Underlying license end; `None` means perpetual.
    license_expires_at: Option<i64>,
    license_type: LicenseType,
    #[serde(with = "b64")]
    signature: Vec<u8>,
    /// Latched by the most recent `validate` call. Never persisted.
    #[serde(skip)]
    status: Status,
}

// Status is transient, so equality deliberately ignores it.
impl PartialEq for Activation {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.product_uid == other.product_uid
            && self.machine_uid == other.machine_uid
            && self.expires_at == other.expires_at
            && self.license_expires_at == other.license_expires_at
            && self.license_type == other.license_type
            && self.signature == other.signature
    }
}

impl Eq for Activation {}

impl Activation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hash: Vec<u8>,
        product_uid: String,
        machine_uid: Vec<u8>,
        expires_at: Option<i64>,
        license_expires_at: Option<i64>,
        license_type: LicenseType,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            hash,
            product_uid,
            machine_uid,
            expires_at,
            license_expires_at,
            license_type,
            signature,
            status: Status::Undefined,
        }
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn product_uid(&self) -> &str {
        &self.product_uid
    }

    pub fn machine_uid(&self) -> &[u8] {
        &self.machine_uid
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn license_expires_at(&self) -> Option<i64> {
        self.license_expires_at
    }

    pub fn license_type(&self) -> LicenseType {
        self.license_type
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The most recent validation outcome, `Undefined` before any validation.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The canonical byte sequence the server signs: hash, product uid and
    /// machine uid back to back, each *present* expiry as a big-endian i64,
    /// then the license type name. Absent expiries contribute no bytes at
    /// all, not a placeholder.
    fn signing_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(
            self.hash.len() + self.product_uid.len() + self.machine_uid.len() + 16 + 12,
        );
        input.extend_from_slice(&self.hash);
        input.extend_from_slice(self.product_uid.as_bytes());
        input.extend_from_slice(&self.machine_uid);
        if let Some(expires_at) = self.expires_at {
            input.extend_from_slice(&expires_at.to_be_bytes());
        }
        if let Some(license_expires_at) = self.license_expires_at {
            input.extend_from_slice(&license_expires_at.to_be_bytes());
        }
        input.extend_from_slice(self.license_type.as_str().as_bytes());
        input
    }

    /// Checks the detached signature over the canonical signing input.
    pub fn verify_signature(&self, verifying_key: &[u8]) -> bool {
        crypto::verify_detached(&[&self.signing_input()], &self.signature, verifying_key)
    }

    /// Validates this activation against the current product, machine and
    /// verifying key, latching the result for later [`status`](Self::status)
    /// calls. Checks run cheapest first; the signature is only verified when
    /// everything else holds.
    pub fn validate(
        &mut self,
        product_uid: &str,
        machine_uid: &[u8],
        verifying_key: &[u8],
    ) -> Status {
        let now = crate::now_millis();

        self.status = if product_uid != self.product_uid {
            Status::InvalidProductUid
        } else if machine_uid != self.machine_uid {
            Status::InvalidMachineUid
        } else if self.license_expires_at.is_some_and(|t| now > t) {
            Status::LicenseExpired
        } else if self.expires_at.is_some_and(|t| now > t) {
            Status::ActivationExpired
        } else if !self.verify_signature(verifying_key) {
            Status::InvalidSignature
        } else {
            Status::Valid
        };

        self.status
    }

    /// True when either the activation lease or the underlying license is in
    /// the past. Independent of product or machine match.
    pub fn is_expired(&self) -> bool {
        let now = crate::now_millis();
        self.expires_at.is_some_and(|t| now > t)
            || self.license_expires_at.is_some_and(|t| now > t)
    }

    /// Ranks this activation against another for the same product and
    /// machine.
    ///
    /// Expiry state dominates. Among live activations a license that never
    /// expires outranks any that does, then a later license end wins, then a
    /// later lease end (a present lease end outranks an absent one), then
    /// the license type weight. Equal records rank as not-more-valuable, so
    /// a first-seen scan is stable.
    pub fn is_more_valuable_than(&self, other: &Activation) -> bool {
        let expired = self.is_expired();
        match (expired, other.is_expired()) {
            (true, false) => return false,
            (false, true) => return true,
            _ => {}
        }

        if !expired && self.license_expires_at != other.license_expires_at {
            return match (self.license_expires_at, other.license_expires_at) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(ours), Some(theirs)) => ours > theirs,
            };
        }

        if self.expires_at != other.expires_at {
            return self.expires_at > other.expires_at;
        }

        self.license_type.compare_value(other.license_type) == std::cmp::Ordering::Greater
    }

    /// A message suitable for direct display to the end user.
    ///
    /// With `hide_details` the non-expiry failure reasons collapse into
    /// numbered "Invalid activation" strings; only the expiry statuses
    /// distinguish trial from non-trial wording.
    pub fn status_user_message(&self, hide_details: bool) -> &'static str {
        match self.status {
            Status::Undefined => {
                if hide_details {
                    "Invalid activation (1)"
                } else {
                    "Undefined"
                }
            }
            Status::NoActivationLoaded => {
                if hide_details {
                    "Invalid activation (2)"
                } else {
                    "No activation loaded"
                }
            }
            Status::InvalidSignature => {
                if hide_details {
                    "Invalid activation (3)"
                } else {
                    "Invalid signature"
                }
            }
            Status::InvalidProductUid => {
                if hide_details {
                    "Invalid activation (4)"
                } else {
                    "Invalid product uid"
                }
            }
            Status::InvalidMachineUid => {
                if hide_details {
                    "Invalid activation (5)"
                } else {
                    "Invalid machine uid"
                }
            }
            Status::LicenseExpired => {
                if self.license_type == LicenseType::Trial {
                    "Your trial license expired"
                } else {
                    "Your license expired"
                }
            }
            Status::ActivationExpired => {
                if self.license_type == LicenseType::Trial {
                    "Your trial activation expired"
                } else {
                    "Your activation expired"
                }
            }
            Status::Valid => "License valid",
        }
    }

    /// One-line human-readable summary for diagnostics.
    pub fn summary(&self) -> String {
        format!(
            "{} license is {}, activation expires on {} and the license itself expires on {}",
            self.license_type,
            self.status,
            expiry_date_string(self.expires_at),
            expiry_date_string(self.license_expires_at),
        )
    }
}

fn expiry_date_string(expiry: Option<i64>) -> String {
    let Some(millis) = expiry else {
        return "never".to_string();
    };
    let Some(when) = DateTime::from_timestamp_millis(millis) else {
        return millis.to_string();
    };
    let days = (millis - crate::now_millis()) / (24 * 60 * 60 * 1000);
    format!("{} (which is {days} day(s) from now)", when.format("%d %b %Y %H:%M"))
}
