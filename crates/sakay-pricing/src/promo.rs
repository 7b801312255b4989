//! # Promo Codes
//!
//! A promo code grants one of three discounts: a percentage of the fare, a
//! fixed amount, or free delivery (the pre-surge fare is waived). Validity is
//! checked in a fixed order and the first failing rule is reported:
//!
//! 1. the code exists (case-insensitive)
//! 2. `now` is inside `[valid_from, valid_until)`
//! 3. the scope matches the request type, or is `all`
//! 4. the subtotal reaches `min_order_value`
//! 5. total uses are below the usage cap
//! 6. the requester's uses are below the per-user cap
//!
//! Rule 1 is the registry's concern ([`PromoBook`](crate::PromoBook)); rules
//! 2 to 6 live on [`PromoCode::check`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sakay_core::{Money, RequestType, Timestamp, ValidationError};

/// Normalize a promo code for lookup: trimmed and upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// ─── Discounts ───────────────────────────────────────────────────────

/// The kind of discount a promo grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DiscountKind {
    /// A share of the pre-discount subtotal, in basis points (`1000` = 10%).
    Percentage {
        /// Basis points of the subtotal.
        bps: u32,
    },
    /// A flat amount off.
    Fixed {
        /// Amount deducted.
        amount: Money,
    },
    /// The base, distance and time portions are waived. Surge still applies.
    FreeDelivery,
}

/// What a validated promo contributes to a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDescriptor {
    /// The normalized code.
    pub code: String,
    /// The discount granted.
    pub discount: DiscountKind,
    /// Upper bound on the discount amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<Money>,
}

// ─── Scope ───────────────────────────────────────────────────────────

/// Which requests a promo applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoScope {
    /// Ride bookings only.
    Ride,
    /// Food orders only.
    Food,
    /// Grocery orders only.
    Grocery,
    /// Every request type, including pharmacy.
    All,
}

impl PromoScope {
    /// Whether a request of `request_type` is covered.
    pub fn covers(&self, request_type: RequestType) -> bool {
        matches!(
            (self, request_type),
            (Self::All, _)
                | (Self::Ride, RequestType::Ride)
                | (Self::Food, RequestType::Food)
                | (Self::Grocery, RequestType::Grocery)
        )
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ride => "ride",
            Self::Food => "food",
            Self::Grocery => "grocery",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for PromoScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a promo cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromoError {
    /// No promo is registered under the code.
    #[error("promo {code} does not exist")]
    NotFound {
        /// The code as given.
        code: String,
    },

    /// `now` is outside the validity window.
    #[error("promo {code} is only valid from {valid_from} until {valid_until}")]
    Expired {
        /// The normalized code.
        code: String,
        /// Start of the window (inclusive).
        valid_from: Timestamp,
        /// End of the window (exclusive).
        valid_until: Timestamp,
    },

    /// The promo does not cover this request type.
    #[error("promo {code} applies to {scope} requests, not {request_type}")]
    ScopeMismatch {
        /// The normalized code.
        code: String,
        /// The promo's scope.
        scope: PromoScope,
        /// The request type it was applied to.
        request_type: RequestType,
    },

    /// The subtotal is below the promo's minimum order value.
    #[error("promo {code} requires a minimum order of {minimum}")]
    BelowMinimum {
        /// The normalized code.
        code: String,
        /// The required minimum.
        minimum: Money,
        /// The subtotal presented.
        subtotal: Money,
    },

    /// The promo's total or per-requester usage cap is exhausted.
    #[error("{}", usage_cap_message(code, *per_requester))]
    UsageCapReached {
        /// The normalized code.
        code: String,
        /// `true` when the per-requester cap was hit rather than the total.
        per_requester: bool,
    },
}

fn usage_cap_message(code: &str, per_requester: bool) -> String {
    if per_requester {
        format!("promo {code} has already been used the maximum number of times by this requester")
    } else {
        format!("promo {code} has reached its usage limit")
    }
}

// ─── Promo definition ────────────────────────────────────────────────

/// Usage counts presented for validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromoUsage {
    /// Uses across all requesters.
    pub total: u32,
    /// Uses by the requester being validated.
    pub by_requester: u32,
}

/// An operator-defined promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    /// Unique code, compared case-insensitively.
    pub code: String,
    /// The discount granted.
    pub discount: DiscountKind,
    /// Start of validity (inclusive).
    pub valid_from: Timestamp,
    /// End of validity (exclusive).
    pub valid_until: Timestamp,
    /// The subtotal must be at least this much.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<Money>,
    /// Upper bound on the discount amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<Money>,
    /// Total uses allowed across all requesters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_cap: Option<u32>,
    /// Uses allowed per requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_user_cap: Option<u32>,
    /// Request types covered.
    pub scope: PromoScope,
}

impl PromoCode {
    /// The normalized lookup key.
    pub fn key(&self) -> String {
        normalize_code(&self.code)
    }

    /// Reject definitions that could never apply or would apply nonsensically.
    pub fn validate_definition(&self) -> Result<(), ValidationError> {
        let code = self.key();
        if code.is_empty() {
            return Err(ValidationError::Missing("promo code"));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ValidationError::Invalid(format!(
                "promo code {code:?} may only contain letters, digits, '-' and '_'"
            )));
        }
        if self.valid_from >= self.valid_until {
            return Err(ValidationError::Invalid(format!(
                "promo {code} validity window is empty: {} is not before {}",
                self.valid_from, self.valid_until
            )));
        }
        match self.discount {
            DiscountKind::Percentage { bps } if bps == 0 || bps > 10_000 => {
                return Err(ValidationError::Invalid(format!(
                    "promo {code} percentage must be between 0.01% and 100%"
                )));
            }
            DiscountKind::Fixed { amount } if amount.centavos() <= 0 => {
                return Err(ValidationError::Invalid(format!(
                    "promo {code} fixed amount must be positive"
                )));
            }
            _ => {}
        }
        for (field, value) in [
            ("min_order_value", self.min_order_value),
            ("max_discount", self.max_discount),
        ] {
            if let Some(amount) = value {
                ValidationError::ensure_non_negative(field, amount.centavos())?;
            }
        }
        Ok(())
    }

    /// Apply rules 2 to 6 in order.
    pub fn check(
        &self,
        subtotal: Money,
        request_type: RequestType,
        usage: PromoUsage,
        now: Timestamp,
    ) -> Result<DiscountDescriptor, PromoError> {
        let code = self.key();

        if now < self.valid_from || now >= self.valid_until {
            return Err(PromoError::Expired {
                code,
                valid_from: self.valid_from,
                valid_until: self.valid_until,
            });
        }

        if !self.scope.covers(request_type) {
            return Err(PromoError::ScopeMismatch {
                code,
                scope: self.scope,
                request_type,
            });
        }

        if let Some(minimum) = self.min_order_value {
            if subtotal < minimum {
                return Err(PromoError::BelowMinimum {
                    code,
                    minimum,
                    subtotal,
                });
            }
        }

        if self.usage_cap.is_some_and(|cap| usage.total >= cap) {
            return Err(PromoError::UsageCapReached {
                code,
                per_requester: false,
            });
        }

        if self.per_user_cap.is_some_and(|cap| usage.by_requester >= cap) {
            return Err(PromoError::UsageCapReached {
                code,
                per_requester: true,
            });
        }

        Ok(self.descriptor())
    }

    /// The discount this promo contributes when valid.
    pub fn descriptor(&self) -> DiscountDescriptor {
        DiscountDescriptor {
            code: self.key(),
            discount: self.discount,
            max_discount: self.max_discount,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
