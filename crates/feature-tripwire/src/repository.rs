//! Persistence for tripwire state: one hash of disabled bits
//! (`tripwire:states`) and one hash of affected-user timestamps per
//! rule (`tripwire:affected_users:{rule_name}`).

use async_trait::async_trait;
use dashmap::DashMap;
use feature_core::Result;
use std::collections::HashMap;

#[async_trait]
pub trait TripwireRepository: Send + Sync {
    /// User ids whose last-affected timestamp is at or before `cutoff`.
    async fn expired_users(&self, rule_name: &str, cutoff: i64) -> Result<Vec<String>>;
    async fn remove_affected(&self, rule_name: &str, user_ids: &[String]) -> Result<()>;
    async fn set_affected(&self, rule_name: &str, user_id: &str, timestamp: i64) -> Result<()>;
    async fn affected_count(&self, rule_name: &str) -> Result<u64>;
    async fn set_disabled(&self, rule_name: &str, disabled: bool) -> Result<()>;
    async fn all_disabled(&self) -> Result<HashMap<String, bool>>;
    async fn clear(&self) -> Result<()>;
}

/// `DashMap`-backed `TripwireRepository` for tests and local runs.
#[derive(Default)]
pub struct InMemoryTripwireRepository {
    /// rule_name -> (user_id -> last-affected unix timestamp)
    affected: DashMap<String, HashMap<String, i64>>,
    disabled: DashMap<String, bool>,
}

impl InMemoryTripwireRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripwireRepository for InMemoryTripwireRepository {
    async fn expired_users(&self, rule_name: &str, cutoff: i64) -> Result<Vec<String>> {
        Ok(self
            .affected
            .get(rule_name)
            .map(|m| {
                m.iter()
                    .filter(|(_, ts)| **ts <= cutoff)
                    .map(|(uid, _)| uid.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove_affected(&self, rule_name: &str, user_ids: &[String]) -> Result<()> {
        if let Some(mut m) = self.affected.get_mut(rule_name) {
            for uid in user_ids {
                m.remove(uid);
            }
        }
        Ok(())
    }

    async fn set_affected(&self, rule_name: &str, user_id: &str, timestamp: i64) -> Result<()> {
        self.affected
            .entry(rule_name.to_string())
            .or_default()
            .insert(user_id.to_string(), timestamp);
        Ok(())
    }

    async fn affected_count(&self, rule_name: &str) -> Result<u64> {
        Ok(self
            .affected
            .get(rule_name)
            .map(|m| m.len() as u64)
            .unwrap_or(0))
    }

    async fn set_disabled(&self, rule_name: &str, disabled: bool) -> Result<()> {
        self.disabled.insert(rule_name.to_string(), disabled);
        Ok(())
    }

    async fn all_disabled(&self) -> Result<HashMap<String, bool>> {
        Ok(self
            .disabled
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.affected.clear();
        self.disabled.clear();
        Ok(())
    }
}
