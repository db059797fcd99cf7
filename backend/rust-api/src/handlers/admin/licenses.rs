use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::license::{CreateLicensePackageRequest, LicensePackageView},
    services::{audit_service::AuditService, license_service::LicenseService, AppState},
};

use crate::handlers::{principal_from, ApiError};

/// POST /admin/licenses - create a seat pool for a university
pub async fn create_license_package(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateLicensePackageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let principal = principal_from(&claims)?;
    let service = LicenseService::new(state.mongo.clone());

    let package = service.create_package(&principal, &req).await.map_err(|e| {
        tracing::error!("Failed to create license package: {}", e);
        ApiError::from(e)
    })?;

    let audit_service = AuditService::new(state.mongo.clone());
    let _ = audit_service
        .log_license_package_created(&claims.sub, &req.university_id, req.total_licenses)
        .await;

    Ok((StatusCode::CREATED, Json(LicensePackageView::from(package))))
}
