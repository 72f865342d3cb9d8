//! Core domain types for the feature-restriction service.

use crate::error::Error;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// The four event names this service understands. Unknown names are
/// rejected at ingress and never reach the log.
pub const CREDIT_CARD_ADDED: &str = "credit_card_added";
pub const SCAM_MESSAGE_FLAGGED: &str = "scam_message_flagged";
pub const CHARGEBACK_OCCURRED: &str = "chargeback_occurred";
pub const PURCHASE_MADE: &str = "purchase_made";

pub const KNOWN_EVENT_NAMES: [&str; 4] = [
    CREDIT_CARD_ADDED,
    SCAM_MESSAGE_FLAGGED,
    CHARGEBACK_OCCURRED,
    PURCHASE_MADE,
];

/// An immutable behavioral event, as accepted at ingress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub event_properties: Map<String, Value>,
}

impl Event {
    /// Build an event, validating that `name` is known and that
    /// `event_properties` carries a coercible `user_id`. Any failure
    /// here is an ingress-time `BadEvent`.
    pub fn validate_new(name: String, event_properties: Map<String, Value>) -> crate::Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::BadEvent("missing 'name'".to_string()));
        }
        if !KNOWN_EVENT_NAMES.contains(&name.as_str()) {
            return Err(Error::BadEvent(format!("unknown event name '{name}'")));
        }
        if event_properties.is_empty() {
            return Err(Error::BadEvent("'event_properties' must not be empty".to_string()));
        }
        let _ = Self::coerce_user_id(&event_properties)?;
        Ok(Self {
            name,
            event_properties,
        })
    }

    /// Extract `user_id` from `event_properties`, coercing a numeric
    /// JSON value to its string form.
    pub fn coerce_user_id(event_properties: &Map<String, Value>) -> crate::Result<String> {
        match event_properties.get("user_id") {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(Error::BadEvent("missing or invalid 'user_id'".to_string())),
        }
    }

    pub fn user_id(&self) -> crate::Result<String> {
        Self::coerce_user_id(&self.event_properties)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.event_properties.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        match self.event_properties.get(key) {
            Some(Value::Number(n)) => n
                .as_f64()
                .and_then(Decimal::from_f64_retain)
                .or_else(|| n.to_string().parse().ok()),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Access flags gating a user's ability to message or purchase. Both
/// start `true`; a rule may flip either to `false`. Monotone downward
/// by convention — nothing in this crate sets a flag back to `true`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessFlags {
    pub can_message: bool,
    pub can_purchase: bool,
}

impl Default for AccessFlags {
    fn default() -> Self {
        Self {
            can_message: true,
            can_purchase: true,
        }
    }
}

/// The whole persisted object for a user: counters, sets, and access
/// flags. Created lazily on first reference, never deleted during
/// steady-state operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAggregate {
    pub user_id: String,
    pub scam_message_flags: u64,
    /// card_id -> zip_code. First write wins per card_id.
    pub credit_cards: BTreeMap<String, String>,
    pub total_credit_cards: u64,
    pub unique_zip_codes: HashSet<String>,
    pub total_spend: Decimal,
    pub total_chargebacks: Decimal,
    pub access_flags: AccessFlags,
}

impl UserAggregate {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scam_message_flags: 0,
            credit_cards: BTreeMap::new(),
            total_credit_cards: 0,
            unique_zip_codes: HashSet::new(),
            total_spend: Decimal::ZERO,
            total_chargebacks: Decimal::ZERO,
            access_flags: AccessFlags::default(),
        }
    }

    /// Add a credit card if its card_id hasn't been seen before.
    /// Idempotent: re-adding the same card_id is a no-op, which is what
    /// makes `credit_card_added` safe under at-least-once redelivery.
    pub fn add_credit_card(&mut self, card_id: &str, zip_code: &str) {
        if !self.credit_cards.contains_key(card_id) {
            self.credit_cards
                .insert(card_id.to_string(), zip_code.to_string());
            self.total_credit_cards += 1;
            self.unique_zip_codes.insert(zip_code.to_string());
        }
    }
}
