//! Compile-time dispatch tables mapping event names to handlers and
//! rule names, in place of a reflection-based registry. Adding a new
//! event or rule means adding a match arm here, not registering a
//! class at import time.

use crate::handlers::{
    ChargebackOccurredHandler, CreditCardAddedHandler, EventHandler, PurchaseMadeHandler,
    ScamMessageFlaggedHandler,
};
use crate::rules::{ChargebackRatioRule, Rule, ScamMessageRule, UniqueZipCodeRule};
use feature_core::types::{
    CHARGEBACK_OCCURRED, CREDIT_CARD_ADDED, PURCHASE_MADE, SCAM_MESSAGE_FLAGGED,
};

/// The handler registered for a known event name. Returns `None` only
/// for names `Event::validate_new` would already have rejected.
pub fn handler_for_event(name: &str) -> Option<Box<dyn EventHandler>> {
    match name {
        CREDIT_CARD_ADDED => Some(Box::new(CreditCardAddedHandler)),
        SCAM_MESSAGE_FLAGGED => Some(Box::new(ScamMessageFlaggedHandler)),
        CHARGEBACK_OCCURRED => Some(Box::new(ChargebackOccurredHandler)),
        PURCHASE_MADE => Some(Box::new(PurchaseMadeHandler)),
        _ => None,
    }
}

/// The rules that run after an event's handler mutates the user.
/// `purchase_made` has none — it only feeds the chargeback ratio's
/// denominator.
pub fn rules_for_event(name: &str) -> Vec<Box<dyn Rule>> {
    match name {
        CREDIT_CARD_ADDED => vec![Box::new(UniqueZipCodeRule)],
        SCAM_MESSAGE_FLAGGED => vec![Box::new(ScamMessageRule)],
        CHARGEBACK_OCCURRED => vec![Box::new(ChargebackRatioRule)],
        PURCHASE_MADE => vec![],
        _ => vec![],
    }
}
