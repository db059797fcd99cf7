use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::{
        auth::{JwtClaims, JwtService},
        csrf,
    },
    models::{
        refresh_token::{RefreshTokenRequest, RefreshTokenResponse},
        user::{AuthResponseCookie, ChangePasswordRequest, LoginRequest, RegisterRequest},
    },
    services::{audit_service::AuditService, auth_service::AuthService, AppState},
};

use super::{parse_object_id, ApiError};

const REFRESH_COOKIE_NAME: &str = "refresh_token";

fn client_meta(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    (ip, user_agent)
}

fn refresh_cookie(token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .path("/api/v1/auth")
        .http_only(true)
        .secure(true)
        .max_age(time::Duration::days(30))
        .build()
}

fn auth_service(state: &AppState) -> AuthService {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    AuthService::new(state.mongo.clone(), jwt_service)
}

/// POST /api/v1/auth/register - bootstrap the initial super admin
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    tracing::info!("Registering bootstrap account: {}", req.email);

    let service = auth_service(&state);
    let audit_service = AuditService::new(state.mongo.clone());
    let email = req.email.clone();

    match service.register(req).await {
        Ok(response) => {
            let _ = audit_service
                .log_register(&response.user.id, &response.user.email, true)
                .await;

            let jar = jar.add(refresh_cookie(response.refresh_token.clone()));
            let body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::CREATED, jar, Json(body)))
        }
        Err(e) => {
            tracing::warn!("Registration refused for {}: {}", email, e);
            let _ = audit_service.log_register("", &email, false).await;
            Err(ApiError::bad_request(e.to_string()))
        }
    }
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let (ip, user_agent) = client_meta(&headers);
    let service = auth_service(&state);
    let audit_service = AuditService::new(state.mongo.clone());
    let email = req.email.clone();

    match service.login(req, ip.clone(), user_agent.clone()).await {
        Ok(response) => {
            let _ = audit_service
                .log_login_success(&response.user.id, &response.user.email, ip, user_agent)
                .await;

            let jar = jar.add(refresh_cookie(response.refresh_token.clone()));
            let body = AuthResponseCookie {
                access_token: response.access_token,
                user: response.user,
            };

            Ok((StatusCode::OK, jar, Json(body)))
        }
        Err(e) => {
            let _ = audit_service
                .log_login_failed(&email, ip, user_agent, &e.to_string())
                .await;
            Err(ApiError::Unauthorized(e.to_string()))
        }
    }
}

/// POST /api/v1/auth/refresh - new access token from the refresh cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(req): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .or(req.refresh_token)
        .ok_or_else(|| ApiError::Unauthorized("Missing refresh token".to_string()))?;

    let service = auth_service(&state);
    match service.refresh(&token).await {
        Ok(access_token) => Ok((StatusCode::OK, Json(RefreshTokenResponse { access_token }))),
        Err(e) => Err(ApiError::Unauthorized(e.to_string())),
    }
}

/// GET /api/v1/auth/csrf-token
pub async fn get_csrf_token() -> impl IntoResponse {
    let token = csrf::generate_csrf_token();
    let response = Json(serde_json::json!({ "csrf_token": token })).into_response();
    csrf::set_csrf_cookie(response, &token)
}

/// GET /api/v1/auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_object_id(&claims.sub, "user id")?;
    let profile = auth_service(&state).profile(&user_id).await?;
    Ok(Json(profile))
}

/// POST /api/v1/auth/logout - revoke the refresh token and drop the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE_NAME) {
        let service = auth_service(&state);
        service.logout(cookie.value()).await?;
    }

    let jar = jar.remove(Cookie::build((REFRESH_COOKIE_NAME, "")).path("/api/v1/auth"));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let user_id = parse_object_id(&claims.sub, "user id")?;
    auth_service(&state)
        .change_password(&user_id, &req.old_password, &req.new_password)
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("incorrect") {
                ApiError::bad_request(message)
            } else {
                ApiError::Internal(message)
            }
        })?;

    Ok(StatusCode::NO_CONTENT)
}
