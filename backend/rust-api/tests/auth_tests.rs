use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn registration_closes_after_bootstrap() {
    let app = common::create_test_app().await;

    // Ensure the bootstrap account exists
    let _ = common::super_admin_token(&app).await;

    // A second registration must be refused
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "email": format!("late-{}@test.com", Uuid::new_v4()),
                        "password": "Password123!",
                        "full_name": "Late Comer",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = common::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn login_with_wrong_password_is_unauthorized() {
    let app = common::create_test_app().await;
    let _ = common::super_admin_token(&app).await;

    let token = common::login(&app, common::SUPER_ADMIN_EMAIL, "wrong-password").await;
    assert!(token.is_none());
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn me_requires_bearer_token() {
    let app = common::create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn me_returns_profile_for_valid_token() {
    let app = common::create_test_app().await;
    let token = common::super_admin_token(&app).await;

    let response = common::get_authed(&app, "/api/v1/auth/me", &token).await;
    let (status, json) = common::read_json(response).await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["email"], common::SUPER_ADMIN_EMAIL);
    assert_eq!(json["role"], "super_admin");
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn student_routes_reject_admin_surface() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    // A student token must not reach the super admin surface
    let response = common::get_authed(&app, "/admin/stats", &student.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nor the university admin surface
    let response = common::get_authed(&app, "/university/stats", &student.token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
