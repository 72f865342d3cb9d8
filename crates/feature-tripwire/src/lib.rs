//! Tripwire controller for the feature-restriction service.
//!
//! Splits pure configuration/state from behavior and an optional
//! persistence repository, the way a circuit breaker would, except
//! this tripwire tracks one disabled bit *per rule name* rather than
//! a single global flag, so its fast path is a small concurrent map
//! instead of one `AtomicBool`.

pub mod repository;

pub use repository::{InMemoryTripwireRepository, TripwireRepository};

use dashmap::DashMap;
use feature_core::Result;
use tracing::info;

/// Sliding-window parameters: `W` seconds, `T` fraction.
#[derive(Debug, Clone, Copy)]
pub struct TripwireConfig {
    pub window_secs: i64,
    pub threshold: f64,
}

impl Default for TripwireConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            threshold: 0.05,
        }
    }
}

/// Supplies the current time as unix seconds. Production code uses
/// `SystemClock`; tests inject a fake clock to exercise window
/// expiry without sleeping in real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Per-rule sliding-window tracker of affected users, deriving a
/// disabled/enabled bit from the affected-fraction relative to a live
/// user count.
pub struct TripwireController {
    config: TripwireConfig,
    repo: Box<dyn TripwireRepository>,
    clock: Box<dyn Clock>,
    /// Fast path: `is_disabled` never awaits the repository.
    disabled_cache: DashMap<String, bool>,
}

impl TripwireController {
    pub fn new(repo: Box<dyn TripwireRepository>, config: TripwireConfig) -> Self {
        Self {
            config,
            repo,
            clock: Box::new(SystemClock),
            disabled_cache: DashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Populate the fast-path cache from the repository. Call once at
    /// startup; `is_disabled` is a cache read afterward.
    pub async fn load(&self) -> Result<()> {
        for (rule_name, disabled) in self.repo.all_disabled().await? {
            self.disabled_cache.insert(rule_name, disabled);
        }
        Ok(())
    }

    /// Returns the current disabled bit for a rule (`false` if never
    /// set). Never touches the backing store.
    pub fn is_disabled(&self, rule_name: &str) -> bool {
        self.disabled_cache
            .get(rule_name)
            .map(|v| *v)
            .unwrap_or(false)
    }

    /// Snapshot of every rule's disabled bit, for observability.
    pub fn disabled_rules(&self) -> std::collections::HashMap<String, bool> {
        self.disabled_cache
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    /// Expire stale entries, record this activation, and recompute the
    /// disabled bit.
    ///
    /// Called by the consumer only after a rule's `process` returns
    /// `Applied` — so a rule's first activation never sees itself
    /// counted against its own gating check.
    pub async fn record_and_recompute(
        &self,
        rule_name: &str,
        user_id: &str,
        total_users: u64,
    ) -> Result<()> {
        let now = self.clock.now();
        let cutoff = now - self.config.window_secs;

        let expired = self.repo.expired_users(rule_name, cutoff).await?;
        if !expired.is_empty() {
            self.repo.remove_affected(rule_name, &expired).await?;
        }

        self.repo.set_affected(rule_name, user_id, now).await?;

        let affected_count = self.repo.affected_count(rule_name).await?;
        let pct = if total_users > 0 {
            affected_count as f64 / total_users as f64
        } else {
            0.0
        };

        let disabled = pct >= self.config.threshold;
        let previously_disabled = self.is_disabled(rule_name);

        self.repo.set_disabled(rule_name, disabled).await?;
        self.disabled_cache
            .insert(rule_name.to_string(), disabled);

        if disabled && !previously_disabled {
            info!(
                rule = rule_name,
                affected = affected_count,
                total_users,
                pct,
                "tripwire thrown: rule disabled"
            );
        } else if !disabled && previously_disabled {
            info!(
                rule = rule_name,
                affected = affected_count,
                total_users,
                pct,
                "tripwire disengaged: rule re-enabled"
            );
        }

        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.repo.clear().await?;
        self.disabled_cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FakeClock(AtomicI64);

    fn controller_with_clock(clock: Box<dyn Clock>) -> TripwireController {
        TripwireController::new(Box::new(InMemoryTripwireRepository::new()), TripwireConfig::default())
            .with_clock(clock)
    }

    #[tokio::test]
    async fn test_disabled_defaults_false() {
        let controller = controller_with_clock(Box::new(SystemClock));
        assert!(!controller.is_disabled("scam_message_rule"));
    }

    #[tokio::test]
    async fn test_zero_total_users_never_disables() {
        let controller = controller_with_clock(Box::new(SystemClock));
        controller
            .record_and_recompute("scam_message_rule", "u1", 0)
            .await
            .unwrap();
        assert!(!controller.is_disabled("scam_message_rule"));
    }

    #[tokio::test]
    async fn test_threshold_disables_rule_at_boundary() {
        let controller = controller_with_clock(Box::new(SystemClock));
        // 5 distinct users out of 100 == 0.05 >= 0.05 threshold.
        for i in 0..5 {
            controller
                .record_and_recompute("scam_message_rule", &format!("u{i}"), 100)
                .await
                .unwrap();
        }
        assert!(controller.is_disabled("scam_message_rule"));
    }

    #[tokio::test]
    async fn test_below_threshold_stays_enabled() {
        let controller = controller_with_clock(Box::new(SystemClock));
        for i in 0..4 {
            controller
                .record_and_recompute("scam_message_rule", &format!("u{i}"), 100)
                .await
                .unwrap();
        }
        assert!(!controller.is_disabled("scam_message_rule"));
    }

    #[tokio::test]
    async fn test_expiry_reenables_rule_after_window() {
        let clock = std::sync::Arc::new(FakeClock(AtomicI64::new(1_000)));
        struct ArcClock(std::sync::Arc<FakeClock>);
        impl Clock for ArcClock {
            fn now(&self) -> i64 {
                self.0 .0.load(Ordering::SeqCst)
            }
        }
        let controller = controller_with_clock(Box::new(ArcClock(clock.clone())));

        for i in 0..5 {
            controller
                .record_and_recompute("scam_message_rule", &format!("u{i}"), 100)
                .await
                .unwrap();
        }
        assert!(controller.is_disabled("scam_message_rule"));

        // Advance past the 300s window, then touch the rule again
        // with a 6th, new user — the first 5 entries expire first.
        clock.0.store(1_000 + 301, Ordering::SeqCst);
        controller
            .record_and_recompute("scam_message_rule", "u_new", 100)
            .await
            .unwrap();
        assert!(!controller.is_disabled("scam_message_rule"));
    }
}
