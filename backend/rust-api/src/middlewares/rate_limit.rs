use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::services::AppState;

/// A fixed-window limit applied to one Redis key prefix.
#[derive(Debug, Clone, Copy)]
struct RateLimitPolicy {
    limit: u32,
    window_seconds: u64,
}

const QUIZ_PER_USER: RateLimitPolicy = RateLimitPolicy {
    limit: 120,
    window_seconds: 60,
};
const QUIZ_PER_IP: RateLimitPolicy = RateLimitPolicy {
    limit: 240,
    window_seconds: 60,
};
const ADMIN_PER_USER: RateLimitPolicy = RateLimitPolicy {
    limit: 200,
    window_seconds: 60,
};
const LOGIN_PER_IP: RateLimitPolicy = RateLimitPolicy {
    limit: 10,
    window_seconds: 300,
};
const REGISTER_PER_IP: RateLimitPolicy = RateLimitPolicy {
    limit: 5,
    window_seconds: 3600,
};

fn rate_limits_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn env_override(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}

fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, X-Real-IP, ConnectInfo
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            return first.trim().to_string();
        }
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return value.trim().to_string();
    }

    if let Some(info) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return info.0.ip().to_string();
    }

    "unknown".to_string()
}

/// INCR + first-hit EXPIRE against a fixed window key
async fn consume(
    redis: &ConnectionManager,
    key: &str,
    policy: RateLimitPolicy,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let count: u32 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;

    if count == 1 {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(policy.window_seconds)
            .query_async::<()>(&mut conn)
            .await?;
    }

    Ok(count <= policy.limit)
}

async fn enforce(
    state: &AppState,
    key: String,
    policy: RateLimitPolicy,
) -> Result<(), StatusCode> {
    let allowed = consume(&state.redis, &key, policy).await.map_err(|e| {
        tracing::error!("Rate limit check failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if !allowed {
        tracing::warn!("Rate limit exceeded: {}", key);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(())
}

/// Per-user and per-IP limits for quiz-taking routes
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limits_disabled() {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(request.headers(), request.extensions());

    if let Some(claims) = request.extensions().get::<super::auth::JwtClaims>() {
        let policy = RateLimitPolicy {
            limit: env_override("RATE_LIMIT_PER_USER", QUIZ_PER_USER.limit),
            ..QUIZ_PER_USER
        };
        enforce(&state, format!("ratelimit:user:{}", claims.sub), policy).await?;
    }

    let policy = RateLimitPolicy {
        limit: env_override("RATE_LIMIT_PER_IP", QUIZ_PER_IP.limit),
        ..QUIZ_PER_IP
    };
    enforce(&state, format!("ratelimit:ip:{}", ip), policy).await?;

    Ok(next.run(request).await)
}

/// Looser per-user limit for the admin surfaces
pub async fn admin_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limits_disabled() {
        return Ok(next.run(request).await);
    }

    if let Some(claims) = request.extensions().get::<super::auth::JwtClaims>() {
        enforce(
            &state,
            format!("ratelimit:admin:{}", claims.sub),
            ADMIN_PER_USER,
        )
        .await?;
    }

    Ok(next.run(request).await)
}

/// Tight window on login attempts, keyed by client IP
pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limits_disabled() {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(request.headers(), request.extensions());
    enforce(&state, format!("ratelimit:login:{}", ip), LOGIN_PER_IP).await?;

    Ok(next.run(request).await)
}

/// Registration is a bootstrap path; keep the window very small
pub async fn register_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if rate_limits_disabled() {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(request.headers(), request.extensions());
    enforce(&state, format!("ratelimit:register:{}", ip), REGISTER_PER_IP).await?;

    Ok(next.run(request).await)
}
