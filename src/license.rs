//! License types and their relative value.

use std::cmp::Ordering;
use std::fmt;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// The kind of license backing an activation.
///
/// The variant names double as the wire strings and feed the canonical
/// signing input, so they must match the server byte for byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseType {
    #[default]
    Undefined,
    Perpetual,
    Subscription,
    Trial,
    Alpha,
    Beta,
}

impl LicenseType {
    /// The wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Perpetual => "Perpetual",
            Self::Subscription => "Subscription",
            Self::Trial => "Trial",
            Self::Alpha => "Alpha",
            Self::Beta => "Beta",
        }
    }

    /// Parses a wire name back into a type.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "Undefined" => Some(Self::Undefined),
            "Perpetual" => Some(Self::Perpetual),
            "Subscription" => Some(Self::Subscription),
            "Trial" => Some(Self::Trial),
            "Alpha" => Some(Self::Alpha),
            "Beta" => Some(Self::Beta),
            _ => None,
        }
    }

    fn weight(self) -> u8 {
        match self {
            Self::Perpetual => 5,
            Self::Subscription => 4,
            Self::Trial => 3,
            Self::Beta => 2,
            Self::Alpha => 1,
            Self::Undefined => 0,
        }
    }

    /// Compares the worth of two license types, used to break ranking ties
    /// between otherwise equal activations.
    pub fn compare_value(self, other: Self) -> Ordering {
        self.weight().cmp(&other.weight())
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for LicenseType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for LicenseType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let name = value.as_str()?;
        Self::from_wire_name(name)
            .ok_or_else(|| FromSqlError::Other(format!("unknown license type: {name}").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for license_type in [
            LicenseType::Undefined,
            LicenseType::Perpetual,
            LicenseType::Subscription,
            LicenseType::Trial,
            LicenseType::Alpha,
            LicenseType::Beta,
        ] {
            assert_eq!(
                LicenseType::from_wire_name(license_type.as_str()),
                Some(license_type)
            );
        }
        assert_eq!(LicenseType::from_wire_name("Premium"), None);
    }

    #[test]
    fn value_order() {
        use LicenseType::*;
        let ascending = [Undefined, Alpha, Beta, Trial, Subscription, Perpetual];
        for window in ascending.windows(2) {
            assert_eq!(window[0].compare_value(window[1]), Ordering::Less);
            assert_eq!(window[1].compare_value(window[0]), Ordering::Greater);
        }
        assert_eq!(Trial.compare_value(Trial), Ordering::Equal);
    }

    #[test]
    fn serializes_as_wire_name() {
        assert_eq!(
            serde_json::to_string(&LicenseType::Perpetual).unwrap(),
            "\"Perpetual\""
        );
        assert_eq!(
            serde_json::from_str::<LicenseType>("\"Trial\"").unwrap(),
            LicenseType::Trial
        );
    }
}
