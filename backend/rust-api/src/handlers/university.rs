use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::license::ProvisionStudentRequest,
    models::session::{GrantSessionRequest, SessionView},
    services::{
        audit_service::AuditService, reporting_service::ReportingService,
        session_service::SessionService, student_service::StudentService, AppState,
    },
};

use super::{parse_object_id, principal_from, ApiError};

/// POST /university/students - Добавить студента (University Admin)
///
/// Seat reservation, account creation and license insert run as a
/// compensating sequence inside the service.
pub async fn provision_student(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ProvisionStudentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let principal = principal_from(&claims)?;
    let service = StudentService::new(state.mongo.clone());
    let audit_service = AuditService::new(state.mongo.clone());

    match service.provision(&principal, &req).await {
        Ok(provisioned) => {
            let _ = audit_service
                .log_provision(&claims.sub, &req.email, true, None)
                .await;
            Ok((StatusCode::CREATED, Json(provisioned)))
        }
        Err(e) => {
            tracing::error!("Failed to provision student: {}", e);
            let message = e.to_string();
            let _ = audit_service
                .log_provision(&claims.sub, &req.email, false, Some(&message))
                .await;

            let status = if message.contains("No available licenses") {
                ApiError::conflict(message)
            } else if message.contains("already exists") {
                ApiError::bad_request(message)
            } else {
                ApiError::from(e)
            };
            Err(status)
        }
    }
}

/// GET /university/students - roster with license info
pub async fn list_students(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = StudentService::new(state.mongo.clone());
    let roster = service.roster(&principal).await?;
    Ok(Json(roster))
}

/// POST /university/students/{id}/sessions - grant a quiz attempt
pub async fn grant_attempt(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(student_id): Path<String>,
    AppJson(req): AppJson<GrantSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let student_id = parse_object_id(&student_id, "student id")?;
    let duration = req
        .duration_minutes
        .filter(|minutes| *minutes > 0)
        .unwrap_or(state.config.default_session_minutes);

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let session = service.grant(&principal, &student_id, duration).await?;

    Ok((StatusCode::CREATED, Json(SessionView::from(session))))
}

/// GET /university/stats - Сводка по лицензиям и сессиям университета
pub async fn university_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = ReportingService::new(state.mongo.clone());
    let dashboard = service.university_dashboard(&principal).await?;
    Ok(Json(dashboard))
}

/// GET /university/sessions - sessions of the admin's students
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let reporting = ReportingService::new(state.mongo.clone());
    let university_id = reporting.university_id_of(&principal).await?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let sessions = service.list_for_university(&university_id).await?;
    Ok(Json(sessions))
}

/// POST /university/sessions/{id}/force-stop - stop an attempt of an own student
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
