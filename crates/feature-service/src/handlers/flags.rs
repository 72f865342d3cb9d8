//! `GET /canmessage` and `GET /canpurchase`: read-only queries against
//! `UserStore`, tolerant of stale reads from a single-writer consumer.

use axum::extract::{Query, State};
use axum::Json;
use feature_core::Error as CoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserIdQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CanMessageResponse {
    pub can_message: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CanPurchaseResponse {
    pub can_purchase: bool,
}

/// Whether `user_id` may currently send messages.
#[utoipa::path(
    get,
    path = "/canmessage",
    tag = "flags",
    params(UserIdQuery),
    responses(
        (status = 200, description = "Flag value", body = CanMessageResponse),
        (status = 404, description = "User has no aggregate", body = crate::error::ErrorResponse),
    )
)]
pub async fn can_message(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<CanMessageResponse>> {
    let user = state.user_repo.get(&q.user_id).await?;
    Ok(Json(CanMessageResponse {
        can_message: user.access_flags.can_message,
    }))
}

/// Whether `user_id` may currently make purchases.
#[utoipa::path(
    get,
    path = "/canpurchase",
    tag = "flags",
    params(UserIdQuery),
    responses(
        (status = 200, description = "Flag value", body = CanPurchaseResponse),
        (status = 404, description = "User has no aggregate", body = crate::error::ErrorResponse),
    )
)]
pub async fn can_purchase(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<Json<CanPurchaseResponse>> {
    let user = state.user_repo.get(&q.user_id).await?;
    Ok(Json(CanPurchaseResponse {
        can_purchase: user.access_flags.can_purchase,
    }))
}
