#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // CORS for the dashboard front-ends
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Auth endpoints (mixed: some public, some protected)
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        // Student quiz flow (JWT + CSRF + rate limit)
        .nest(
            "/api/v1/quiz",
            quiz_routes()
                .layer(cors)
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        // In-app notifications for any authenticated principal
        .nest(
            "/api/v1/notifications",
            notification_routes()
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        // University admin surface
        .nest(
            "/university",
            university_routes(app_state.clone())
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        // Super admin surface
        .nest(
            "/admin",
            admin_routes(app_state.clone())
                .layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware)) // Apply CSP to all responses
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn quiz_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/questions", get(handlers::sessions::list_questions))
        .route("/sessions", post(handlers::sessions::start_session))
        .route("/sessions/current", get(handlers::sessions::current_session))
        .route(
            "/sessions/{id}/answers",
            post(handlers::sessions::record_answer),
        )
        .route(
            "/sessions/{id}/review",
            post(handlers::sessions::toggle_review),
        )
        .route(
            "/sessions/{id}/submit",
            post(handlers::sessions::submit_session),
        )
        .route("/sessions/{id}/stream", get(handlers::sse::session_stream))
        .route("/results", get(handlers::sessions::my_results))
}

fn notification_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", get(handlers::notifications::list_notifications))
        .route(
            "/{id}/read",
            post(handlers::notifications::mark_notification_read),
        )
}

fn university_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route(
            "/students",
            get(handlers::university::list_students).post(handlers::university::provision_student),
        )
        .route(
            "/students/{id}/sessions",
            post(handlers::university::grant_attempt),
        )
        .route("/stats", get(handlers::university::university_stats))
        .route("/sessions", get(handlers::university::list_sessions))
        .route(
            "/sessions/{id}/force-stop",
            post(handlers::university::force_stop_session),
        )
        .layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::admin_rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(
            middlewares::auth::university_admin_guard_middleware,
        ))
}

fn admin_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        // University management
        .route(
            "/universities",
            get(handlers::admin::list_universities).post(handlers::admin::create_university),
        )
        // License packages
        .route("/licenses", post(handlers::admin::create_license_package))
        // Question bank
        .route("/questions/import", post(handlers::admin::import_questions))
        // Sessions across every university
        .route("/sessions", get(handlers::admin::list_all_sessions))
        .route(
            "/sessions/{id}/force-stop",
            post(handlers::admin::force_stop_session),
        )
        // Platform totals
        .route("/stats", get(handlers::admin::platform_stats))
        .layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::admin_rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(
            middlewares::auth::super_admin_guard_middleware,
        ))
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Public routes with rate limiting
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let refresh_route = Router::new().route("/refresh", post(handlers::auth::refresh_token));

    // CSRF token endpoint (public, no auth required)
    let csrf_route = Router::new().route("/csrf-token", get(handlers::auth::get_csrf_token));

    let public_routes = register_route
        .merge(login_route)
        .merge(refresh_route)
        .merge(csrf_route);

    // Protected routes (require JWT auth + CSRF protection)
    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route("/logout", post(handlers::auth::logout))
        .route("/change-password", post(handlers::auth::change_password))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
