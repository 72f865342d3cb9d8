//! HTTP route definitions.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{event, flags, health};
use crate::state::AppState;

/// OpenAPI documentation for the feature-restriction service's HTTP
/// surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Feature Restriction Service",
        version = "1.0.0",
        description = "Event-driven abuse detection and access-flag service"
    ),
    paths(
        health::health,
        event::create_event,
        flags::can_message,
        flags::can_purchase,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        health::HealthResponse,
        event::EventRequest,
        event::EventStatusResponse,
        flags::CanMessageResponse,
        flags::CanPurchaseResponse,
    )),
    tags(
        (name = "health", description = "Liveness/readiness"),
        (name = "events", description = "Event ingestion"),
        (name = "flags", description = "Access-flag queries"),
    )
)]
pub struct ApiDoc;

/// Build the axum router for the whole HTTP surface.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/event", post(event::create_event))
        .route("/canmessage", get(flags::can_message))
        .route("/canpurchase", get(flags::can_purchase))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
