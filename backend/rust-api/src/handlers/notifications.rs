use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    services::{notification_service::NotificationService, AppState},
};

use super::{parse_object_id, principal_from, ApiError};

/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = NotificationService::new(state.mongo.clone());
    let notifications = service.list_for(&principal).await?;
    Ok(Json(notifications))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let notification_id = parse_object_id(&notification_id, "notification id")?;

    let service = NotificationService::new(state.mongo.clone());
    service.mark_read(&principal, &notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
