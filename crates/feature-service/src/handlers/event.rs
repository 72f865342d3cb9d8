//! `POST /event`: validates the request, appends it to the durable
//! log, and returns immediately — success means the event was
//! durably appended, not that it has been processed.

use axum::extract::State;
use axum::Json;
use feature_core::types::Event;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::state::AppState;

/// `{name, event_properties}` wire body. Both fields default to an
/// absent/empty value rather than failing JSON deserialization
/// outright, so a missing `name` or `event_properties` surfaces as a
/// `BadEvent` validation error with the `{"detail": ...}` shape
/// instead of axum's generic body-parsing rejection.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EventRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub event_properties: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventStatusResponse {
    pub status: String,
}

/// Validate and enqueue a behavioral event.
#[utoipa::path(
    post,
    path = "/event",
    tag = "events",
    request_body = EventRequest,
    responses(
        (status = 200, description = "Event accepted and appended to the stream", body = EventStatusResponse),
        (status = 400, description = "Validation failure", body = crate::error::ErrorResponse),
        (status = 500, description = "Backing store failure", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EventRequest>,
) -> ApiResult<Json<EventStatusResponse>> {
    let event = Event::validate_new(req.name.unwrap_or_default(), req.event_properties.unwrap_or_default())?;

    state
        .event_log
        .append(&event.name, &event.event_properties)
        .await?;

    Ok(Json(EventStatusResponse {
        status: format!("Event '{}' added to the stream.", event.name),
    }))
}
