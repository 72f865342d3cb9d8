//! The three abuse-detection rules.

use feature_core::repository::UserRepository;
use feature_core::types::UserAggregate;
use feature_core::Result;
use feature_tripwire::TripwireController;
use rust_decimal::Decimal;

/// Outcome of running a rule against a user. Not a `Result` — none of
/// the three outcomes are error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Applied,
    Skipped,
    Disabled,
}

/// A named abuse-detection rule: a pure-ish predicate over a user
/// aggregate (`evaluate`) and the flag mutation to perform if it fires
/// (`apply`).
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, user: &UserAggregate) -> bool;
    fn apply(&self, user: &mut UserAggregate);

    /// Run the rule's full `process` sequence:
    /// 1. If the tripwire has disabled this rule, do nothing.
    /// 2. Else evaluate; skip if the predicate is false.
    /// 3. Else apply, persist, and report `Applied`.
    ///
    /// The tripwire is only *read* here — recording this activation
    /// against the tripwire's window is the consumer's job, which
    /// calls `TripwireController::record_and_recompute` after seeing
    /// `Applied`.
    fn process<'a>(
        &'a self,
        tripwire: &'a TripwireController,
        user_repo: &'a (dyn UserRepository + 'a),
        user: &'a mut UserAggregate,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RuleOutcome>> + Send + 'a>>
    {
        Box::pin(async move {
            if tripwire.is_disabled(self.name()) {
                return Ok(RuleOutcome::Disabled);
            }
            if !self.evaluate(user) {
                return Ok(RuleOutcome::Skipped);
            }
            self.apply(user);
            user_repo.save(user).await?;
            Ok(RuleOutcome::Applied)
        })
    }
}

/// Fires when a user has added more than 2 credit cards and over 75%
/// of them carry distinct zip codes — a signature of card-testing
/// fraud rather than one household's cards.
pub struct UniqueZipCodeRule;

impl Rule for UniqueZipCodeRule {
    fn name(&self) -> &'static str {
        "unique_zip_code_rule"
    }

    fn evaluate(&self, user: &UserAggregate) -> bool {
        if user.total_credit_cards <= 2 {
            return false;
        }
        let ratio = user.unique_zip_codes.len() as f64 / user.total_credit_cards as f64;
        ratio > 0.75
    }

    fn apply(&self, user: &mut UserAggregate) {
        user.access_flags.can_purchase = false;
    }
}

/// Fires once a user has been flagged for scam messages twice.
pub struct ScamMessageRule;

impl Rule for ScamMessageRule {
    fn name(&self) -> &'static str {
        "scam_message_rule"
    }

    fn evaluate(&self, user: &UserAggregate) -> bool {
        user.scam_message_flags >= 2
    }

    fn apply(&self, user: &mut UserAggregate) {
        user.access_flags.can_message = false;
    }
}

/// Fires when a user's chargebacks exceed 10% of their total spend.
pub struct ChargebackRatioRule;

impl Rule for ChargebackRatioRule {
    fn name(&self) -> &'static str {
        "chargeback_ratio_rule"
    }

    fn evaluate(&self, user: &UserAggregate) -> bool {
        if user.total_spend <= Decimal::ZERO {
            return false;
        }
        let ratio = user.total_chargebacks / user.total_spend;
        ratio > Decimal::new(10, 2)
    }

    fn apply(&self, user: &mut UserAggregate) {
        user.access_flags.can_purchase = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_core::repository::InMemoryUserRepository;
    use feature_tripwire::{InMemoryTripwireRepository, TripwireConfig};

    fn controller() -> TripwireController {
        TripwireController::new(Box::new(InMemoryTripwireRepository::new()), TripwireConfig::default())
    }

    #[test]
    fn test_unique_zip_code_rule_boundary() {
        let rule = UniqueZipCodeRule;
        let mut user = UserAggregate::new("u1");

        // Exactly 2 cards never fires, regardless of zip uniqueness.
        user.add_credit_card("c1", "10001");
        user.add_credit_card("c2", "10002");
        assert!(!rule.evaluate(&user));

        // A 3rd card with a distinct zip: 3/3 > 0.75.
        user.add_credit_card("c3", "10003");
        assert!(rule.evaluate(&user));
    }

    #[test]
    fn test_unique_zip_code_rule_two_distinct_zips_of_three_cards_does_not_fire() {
        let rule = UniqueZipCodeRule;
        let mut user = UserAggregate::new("u1");
        user.add_credit_card("c1", "10001");
        user.add_credit_card("c2", "10001");
        user.add_credit_card("c3", "10002");
        // 2 distinct zips / 3 cards = 0.666..., not > 0.75.
        assert!(!rule.evaluate(&user));
    }

    #[test]
    fn test_scam_message_rule_boundary() {
        let rule = ScamMessageRule;
        let mut user = UserAggregate::new("u1");
        user.scam_message_flags = 1;
        assert!(!rule.evaluate(&user));
        user.scam_message_flags = 2;
        assert!(rule.evaluate(&user));
    }

    #[test]
    fn test_chargeback_ratio_rule_zero_spend_never_fires() {
        let rule = ChargebackRatioRule;
        let mut user = UserAggregate::new("u1");
        user.total_chargebacks = Decimal::new(50, 0);
        assert!(!rule.evaluate(&user));
    }

    #[test]
    fn test_chargeback_ratio_rule_boundary() {
        let rule = ChargebackRatioRule;
        let mut user = UserAggregate::new("u1");
        user.total_spend = Decimal::new(100, 0);
        user.total_chargebacks = Decimal::new(10, 0);
        // Exactly 10% is not > 10%.
        assert!(!rule.evaluate(&user));
        user.total_chargebacks = Decimal::new(15, 0);
        assert!(rule.evaluate(&user));
    }

    #[tokio::test]
    async fn test_process_skips_when_disabled() {
        let tripwire = controller();
        tripwire
            .record_and_recompute("scam_message_rule", "seed", 1)
            .await
            .unwrap();
        assert!(tripwire.is_disabled("scam_message_rule"));

        let repo = InMemoryUserRepository::new();
        let mut user = UserAggregate::new("u1");
        user.scam_message_flags = 5;

        let outcome = ScamMessageRule
            .process(&tripwire, &repo, &mut user)
            .await
            .unwrap();
        assert_eq!(outcome, RuleOutcome::Disabled);
        // Flags untouched: a disabled rule never mutates the user.
        assert!(user.access_flags.can_message);
    }

    #[tokio::test]
    async fn test_process_applies_and_saves() {
        let tripwire = controller();
        let repo = InMemoryUserRepository::new();
        let mut user = UserAggregate::new("u1");
        user.scam_message_flags = 2;

        let outcome = ScamMessageRule
            .process(&tripwire, &repo, &mut user)
            .await
            .unwrap();
        assert_eq!(outcome, RuleOutcome::Applied);
        assert!(!user.access_flags.can_message);
        assert!(!repo.get("u1").await.unwrap().access_flags.can_message);
    }
}
