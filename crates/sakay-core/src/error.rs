//! # Error Types
//!
//! Input validation errors shared by every crate. Domain crates define their
//! own `thiserror` enums and wrap this one where malformed input is possible.

use thiserror::Error;

/// Malformed input rejected before it reaches any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A quantity that must be non-negative was negative.
    #[error("{field} must not be negative, got {value}")]
    Negative {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A required field was absent or empty.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A money amount could not be parsed.
    #[error("invalid money amount {0:?}: expected a decimal with at most two places")]
    InvalidMoney(String),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    /// A string did not name a known variant of an enumeration.
    #[error("unknown {kind} {value:?}")]
    UnknownVariant {
        /// The enumeration being parsed (e.g. "vehicle class").
        kind: &'static str,
        /// The rejected text.
        value: String,
    },

    /// Any other rule violation, described in prose.
    #[error("{0}")]
    Invalid(String),
}

impl ValidationError {
    /// Reject `value` if it is negative.
    pub fn ensure_non_negative(field: &'static str, value: i64) -> Result<(), Self> {
        if value < 0 {
            Err(Self::Negative { field, value })
        } else {
            Ok(())
        }
    }
}
