use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::answer::{AnswerView, RecordSelectionRequest, ToggleReviewRequest},
    models::session::SessionView,
    services::{
        answer_service::AnswerService, question_service::QuestionService,
        session_service::SessionService, AppState,
    },
};

use super::{parse_object_id, principal_from, ApiError};

/// GET /api/v1/quiz/questions - the fixed question set, answers withheld
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuestionService::new(state.mongo.clone());
    let questions = service.list_views().await?;
    Ok(Json(questions))
}

/// POST /api/v1/quiz/sessions - start (or resume) the caller's attempt
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let snapshot = service
        .start(&principal, state.config.default_session_minutes)
        .await
        .map_err(|e| {
            tracing::error!("Failed to start session: {}", e);
            ApiError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/v1/quiz/sessions/current - open attempt with recorded answers
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    match service.current(&principal).await? {
        Some(snapshot) => Ok(Json(snapshot).into_response()),
        None => Err(ApiError::not_found("No open session")),
    }
}

/// POST /api/v1/quiz/sessions/{id}/answers - record a selection
pub async fn record_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<RecordSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let session_id = parse_object_id(&session_id, "session id")?;

    let service = AnswerService::new(state.mongo.clone());
    let entry = service
        .record_selection(&principal, &session_id, &req)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(AnswerView::from(entry)))
}

/// POST /api/v1/quiz/sessions/{id}/review - toggle the review flag
pub async fn toggle_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<ToggleReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let session_id = parse_object_id(&session_id, "session id")?;

    let service = AnswerService::new(state.mongo.clone());
    let entry = service
        .toggle_review(&principal, &session_id, &req)
        .await
        .map_err(map_ledger_error)?;

    Ok(Json(AnswerView::from(entry)))
}

/// POST /api/v1/quiz/sessions/{id}/submit - score and close the attempt
pub async fn submit_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;
    let session_id = parse_object_id(&session_id, "session id")?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let session = service.submit(&principal, &session_id).await.map_err(|e| {
        tracing::warn!("Submit failed for session {}: {}", session_id.to_hex(), e);
        ApiError::from(e)
    })?;

    Ok(Json(SessionView::from(session)))
}

/// GET /api/v1/quiz/results - the caller's terminal sessions
pub async fn my_results(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from(&claims)?;

    let service = SessionService::new(state.mongo.clone(), state.redis.clone());
    let results = service.results_for_student(&principal).await?;
    Ok(Json(results))
}

fn map_ledger_error(e: anyhow::Error) -> ApiError {
    let message = e.to_string();
    if message.contains("not active") || message.contains("run out") {
        ApiError::conflict(message)
    } else if message.contains("Invalid question id") {
        ApiError::bad_request(message)
    } else {
        ApiError::from(e)
    }
}
