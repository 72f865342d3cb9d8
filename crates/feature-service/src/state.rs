//! Shared application state handed to every handler.

use crate::handlers::health::ConsumerReadiness;
use feature_core::repository::{EventLog, UserRepository};
use feature_tripwire::TripwireController;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<dyn UserRepository>,
    pub event_log: Arc<dyn EventLog>,
    pub tripwire: Arc<TripwireController>,
    pub consumer_readiness: Arc<ConsumerReadiness>,
}

impl AppState {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        event_log: Arc<dyn EventLog>,
        tripwire: Arc<TripwireController>,
    ) -> Self {
        Self {
            user_repo,
            event_log,
            tripwire,
            consumer_readiness: Arc::new(ConsumerReadiness::default()),
        }
    }
}
