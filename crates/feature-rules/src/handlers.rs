//! Per-event handlers: each validates the event's required
//! properties, then mutates the user aggregate in place.
//! Handlers never touch rules or the tripwire — that's the consumer's
//! job, driven by [`crate::registry::rules_for_event`].

use feature_core::types::{Event, UserAggregate};
use feature_core::{Error, Result};

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event, user: &mut UserAggregate) -> Result<()>;
}

fn required_str(event: &Event, key: &str) -> Result<String> {
    event.get_str(key).ok_or_else(|| Error::BadEventProperties {
        event: event.name.clone(),
        reason: format!("missing required property '{key}'"),
    })
}

fn required_decimal(event: &Event, key: &str) -> Result<rust_decimal::Decimal> {
    event.get_decimal(key).ok_or_else(|| Error::BadEventProperties {
        event: event.name.clone(),
        reason: format!("missing or non-numeric required property '{key}'"),
    })
}

/// `credit_card_added`: requires `card_id` and `zip_code`. Idempotent —
/// re-adding the same `card_id` does not inflate `total_credit_cards`
/// or duplicate the zip code (mirrors `UserAggregate::add_credit_card`).
pub struct CreditCardAddedHandler;

impl EventHandler for CreditCardAddedHandler {
    fn handle(&self, event: &Event, user: &mut UserAggregate) -> Result<()> {
        let card_id = required_str(event, "card_id")?;
        let zip_code = required_str(event, "zip_code")?;
        user.add_credit_card(&card_id, &zip_code);
        Ok(())
    }
}

/// `scam_message_flagged`: no required properties beyond the user id.
/// Increments the scam-message counter unconditionally.
pub struct ScamMessageFlaggedHandler;

impl EventHandler for ScamMessageFlaggedHandler {
    fn handle(&self, _event: &Event, user: &mut UserAggregate) -> Result<()> {
        user.scam_message_flags += 1;
        Ok(())
    }
}

/// `chargeback_occurred`: requires a numeric `amount`, added to
/// `total_chargebacks`.
pub struct ChargebackOccurredHandler;

impl EventHandler for ChargebackOccurredHandler {
    fn handle(&self, event: &Event, user: &mut UserAggregate) -> Result<()> {
        let amount = required_decimal(event, "amount")?;
        user.total_chargebacks += amount;
        Ok(())
    }
}

/// `purchase_made`: requires a numeric `amount`, added to
/// `total_spend`. Has no associated rule — it only grows the
/// denominator the chargeback-ratio rule divides against.
pub struct PurchaseMadeHandler;

impl EventHandler for PurchaseMadeHandler {
    fn handle(&self, event: &Event, user: &mut UserAggregate) -> Result<()> {
        let amount = required_decimal(event, "amount")?;
        user.total_spend += amount;
        Ok(())
    }
}
