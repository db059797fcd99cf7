use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::question::{ImportQuestionsRequest, ImportQuestionsResponse},
    services::{audit_service::AuditService, question_service::QuestionService, AppState},
};

use crate::handlers::ApiError;

/// POST /admin/questions/import - bulk-load the question bank.
/// Questions are immutable once imported; there is no update or delete.
pub async fn import_questions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let service = QuestionService::new(state.mongo.clone());
    let imported = service.import(req).await.map_err(|e| {
        tracing::error!("Failed to import questions: {}", e);
        ApiError::from(e)
    })?;

    let audit_service = AuditService::new(state.mongo.clone());
    let _ = audit_service
        .log_questions_imported(&claims.sub, imported)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ImportQuestionsResponse { imported }),
    ))
}
