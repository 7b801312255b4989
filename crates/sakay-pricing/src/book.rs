//! # Promo Book
//!
//! The registry of promo codes and their usage counters.
//!
//! `validate` reads counters without changing them. `consume` re-runs the
//! same checks and increments under one write lock, so concurrent
//! confirmations can never push a promo past its caps. `release` undoes a
//! consumption whose surrounding confirmation did not persist.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use sakay_core::{Money, RequestType, RequesterId, Timestamp, ValidationError};

use crate::promo::{normalize_code, DiscountDescriptor, PromoCode, PromoError, PromoUsage};

/// Errors raised when registering a promo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// A promo with the same case-insensitive code exists.
    #[error("promo {code} is already registered")]
    Duplicate {
        /// The normalized code.
        code: String,
    },

    /// The definition is malformed.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A promo together with its current usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoSnapshot {
    /// The promo definition.
    #[serde(flatten)]
    pub promo: PromoCode,
    /// Uses across all requesters.
    pub total_uses: u32,
}

#[derive(Debug)]
struct Entry {
    promo: PromoCode,
    total_uses: u32,
    by_requester: HashMap<RequesterId, u32>,
}

impl Entry {
    fn usage(&self, requester: &RequesterId) -> PromoUsage {
        PromoUsage {
            total: self.total_uses,
            by_requester: self.by_requester.get(requester).copied().unwrap_or(0),
        }
    }
}

/// Thread-safe promo registry.
#[derive(Debug, Default)]
pub struct PromoBook {
    entries: RwLock<HashMap<String, Entry>>,
}

impl PromoBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// A book seeded with `promos`.
    pub fn with_promos(promos: impl IntoIterator<Item = PromoCode>) -> Result<Self, RegisterError> {
        let book = Self::new();
        for promo in promos {
            book.register(promo)?;
        }
        Ok(book)
    }

    /// Add a promo. Codes are unique case-insensitively.
    pub fn register(&self, mut promo: PromoCode) -> Result<(), RegisterError> {
        promo.validate_definition()?;
        let key = promo.key();
        promo.code = key.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(RegisterError::Duplicate { code: key });
        }
        tracing::info!(code = %key, scope = %promo.scope, "promo registered");
        entries.insert(
            key,
            Entry {
                promo,
                total_uses: 0,
                by_requester: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Look up a promo by code.
    pub fn get(&self, code: &str) -> Option<PromoSnapshot> {
        self.entries.read().get(&normalize_code(code)).map(|e| PromoSnapshot {
            promo: e.promo.clone(),
            total_uses: e.total_uses,
        })
    }

    /// All registered promos, ordered by code.
    pub fn list(&self) -> Vec<PromoSnapshot> {
        let mut all: Vec<PromoSnapshot> = self
            .entries
            .read()
            .values()
            .map(|e| PromoSnapshot {
                promo: e.promo.clone(),
                total_uses: e.total_uses,
            })
            .collect();
        all.sort_by(|a, b| a.promo.code.cmp(&b.promo.code));
        all
    }

    /// How many times `requester` has used `code`.
    pub fn uses_by(&self, code: &str, requester: &RequesterId) -> u32 {
        self.entries
            .read()
            .get(&normalize_code(code))
            .map(|e| e.usage(requester).by_requester)
            .unwrap_or(0)
    }

    /// Check whether `code` applies, without consuming a use.
    pub fn validate(
        &self,
        code: &str,
        subtotal: Money,
        request_type: RequestType,
        requester: &RequesterId,
        now: Timestamp,
    ) -> Result<DiscountDescriptor, PromoError> {
        let entries = self.entries.read();
        let entry = lookup(&entries, code)?;
        entry
            .promo
            .check(subtotal, request_type, entry.usage(requester), now)
    }

    /// Validate and record one use atomically.
    pub fn consume(
        &self,
        code: &str,
        subtotal: Money,
        request_type: RequestType,
        requester: &RequesterId,
        now: Timestamp,
    ) -> Result<DiscountDescriptor, PromoError> {
        let mut entries = self.entries.write();
        let key = normalize_code(code);
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| PromoError::NotFound { code: key.clone() })?;
        let descriptor = entry
            .promo
            .check(subtotal, request_type, entry.usage(requester), now)?;
        entry.total_uses = entry.total_uses.saturating_add(1);
        let mine = entry.by_requester.entry(requester.clone()).or_insert(0);
        *mine = mine.saturating_add(1);
        tracing::debug!(code = %key, requester = %requester, total_uses = entry.total_uses, "promo use consumed");
        Ok(descriptor)
    }

    /// Return a use previously taken by [`consume`](Self::consume).
    pub fn release(&self, code: &str, requester: &RequesterId) {
        let mut entries = self.entries.write();
        let key = normalize_code(code);
        let Some(entry) = entries.get_mut(&key) else {
            return;
        };
        entry.total_uses = entry.total_uses.saturating_sub(1);
        if let Some(mine) = entry.by_requester.get_mut(requester) {
            *mine = mine.saturating_sub(1);
        }
        tracing::debug!(code = %key, requester = %requester, "promo use released");
    }
}

fn lookup<'a>(entries: &'a HashMap<String, Entry>, code: &str) -> Result<&'a Entry, PromoError> {
    let key = normalize_code(code);
    entries.get(&key).ok_or(PromoError::NotFound { code: key })
}
