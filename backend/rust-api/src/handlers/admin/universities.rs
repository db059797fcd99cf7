use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::university::CreateUniversityRequest,
    services::{
        audit_service::AuditService, university_service::UniversityService, AppState,
    },
};

use crate::handlers::{principal_from, ApiError};

/// POST /admin/universities - Создать университет вместе с админом
pub async fn create_university(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateUniversityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let principal = principal_from(&claims)?;
    let service = UniversityService::new(state.mongo.clone());

    let detail = service
        .create_university(&principal, &req)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create university: {}", e);
            let message = e.to_string();
            if message.contains("already exists") {
                ApiError::bad_request(message)
            } else {
                ApiError::from(e)
            }
        })?;

    let audit_service = AuditService::new(state.mongo.clone());
    let _ = audit_service
        .log_university_created(&claims.sub, &req.name, &req.admin_email)
        .await;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /admin/universities - list with license usage
pub async fn list_universities(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = UniversityService::new(state.mongo.clone());
    let rows = service.list_with_usage().await?;
    Ok(Json(rows))
}
