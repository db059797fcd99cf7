use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::services::{reporting_service::ReportingService, AppState};

use crate::handlers::ApiError;

/// GET /admin/stats - platform totals
pub async fn platform_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ReportingService::new(state.mongo.clone());
    let stats = service.platform_stats().await?;
    Ok(Json(stats))
}
