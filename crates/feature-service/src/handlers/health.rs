//! `GET /health` — ambient liveness signal every runnable binary in
//! this workspace exposes. Here it doubles as readiness for the
//! background `StreamConsumer`, reported via a shared flag set once
//! startup (consumer-group creation) completes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use utoipa::ToSchema;

use crate::state::AppState;

/// Flips to `true` once `StreamConsumer::run` has created its consumer
/// group and loaded tripwire state. Shared between the consumer task
/// and the `/health` handler.
#[derive(Default)]
pub struct ConsumerReadiness(AtomicBool);

impl ConsumerReadiness {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness/readiness check: `200` once the stream consumer has
/// finished startup, `503` before that.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Consumer has not finished startup", body = HealthResponse),
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.consumer_readiness.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if ready { "ready" } else { "starting" }.to_string(),
        }),
    )
}
