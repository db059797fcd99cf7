use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    models::session::SessionView,
    services::{audit_service::AuditService, session_service::SessionService, AppState},
};

use crate::handlers::{parse_object_id, principal_from, ApiError};

/// GET /admin/sessions - every session on the platform
pub async fn list_all_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let sessions = service.list_all().await?;
    Ok(Json(sessions))
}

/// POST /admin/sessions/{id}/force-stop - stop any active attempt
pub async fn force_stop_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let session_id = parse_object_id(&session_id, "session id")?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let session = service.force_stop(&principal, &session_id).await?;

    let audit_service = AuditService::new(state.mongo.clone());
    let _ = audit_service
        .log_force_stop(&claims.sub, &session_id.to_hex())
        .await;

    Ok(Json(SessionView::from(session)))
}
