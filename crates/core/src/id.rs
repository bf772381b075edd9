//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers here are caller-supplied tokens (typed by an operator or
//! produced by a scanner). The domain never generates them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a receiving voucher (e.g. `2025-0044356`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoucherId(String);

/// Identifier of a container / license plate number (e.g. `LPN-000123`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

/// Catalog code of a material (e.g. `MS130.9000.8404`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialCode(String);

macro_rules! impl_token_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier from raw input.
            ///
            /// Surrounding whitespace is trimmed; blank input is rejected.
            pub fn new(raw: impl AsRef<str>) -> Result<Self, DomainError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, " cannot be blank")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_token_newtype!(VoucherId, "VoucherId");
impl_token_newtype!(ContainerId, "ContainerId");
impl_token_newtype!(MaterialCode, "MaterialCode");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_and_typed_input_are_equivalent() {
        let scanned = ContainerId::new("LPN-000123").unwrap();
        let typed: ContainerId = "  LPN-000123 ".parse().unwrap();
        assert_eq!(scanned, typed);
        assert_eq!(typed.as_str(), "LPN-000123");
    }

    #[test]
    fn blank_identifiers_are_rejected() {
        let err = MaterialCode::new("   ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.contains("MaterialCode")));
    }

    #[test]
    fn identifiers_serialize_transparently() {
        let id = VoucherId::new("2025-0044356").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"2025-0044356\"");
    }
}
