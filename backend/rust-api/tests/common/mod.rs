#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use mongodb::bson::doc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use marsim_api::{config::Config, create_router, services::AppState};

pub const SUPER_ADMIN_EMAIL: &str = "root@test.com";
pub const SUPER_ADMIN_PASSWORD: &str = "Root123!@#";

/// Number of seeded quiz questions; every correct answer is "B"
pub const SEEDED_QUESTIONS: usize = 10;

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    let config = Config::load().expect("Failed to load test configuration");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    seed_questions(&mongo_client, &config.mongo_database).await;

    create_router(app_state)
}

/// Seed a fixed question set once; parallel test binaries may race, so
/// duplicate-free seeding is best-effort behind a count check.
async fn seed_questions(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let questions = db.collection::<mongodb::bson::Document>("quiz_questions");

    let existing = questions.count_documents(doc! {}).await.unwrap_or(0);
    if existing > 0 {
        return;
    }

    let now = mongodb::bson::DateTime::now();
    let docs: Vec<mongodb::bson::Document> = (0..SEEDED_QUESTIONS)
        .map(|i| {
            doc! {
                "title": format!("Question {}", i + 1),
                "description": "Pick the second option.",
                "option_a": "first",
                "option_b": "second",
                "option_c": "third",
                "option_d": "fourth",
                "correct_answer": "B",
                "category": "general",
                "difficulty": 1,
                "created_at": now,
            }
        })
        .collect();

    if let Err(e) = questions.insert_many(docs).await {
        eprintln!("Question seed failed (parallel test?): {}", e);
    }
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn get_csrf_token(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/auth/csrf-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let csrf_cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|header| header.starts_with("csrf_token="))
        .and_then(|header| header.split(';').next())
        .and_then(|pair| pair.split('=').nth(1))
        .unwrap_or("")
        .to_string();

    let (_, json) = read_json(response).await;
    let csrf_token = json["csrf_token"].as_str().unwrap().to_string();

    (csrf_token, csrf_cookie)
}

/// POST with bearer auth and CSRF headers
pub async fn post_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: Value,
) -> axum::response::Response {
    let (csrf_token, csrf_cookie) = get_csrf_token(app).await;

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .header("x-csrf-token", &csrf_token)
                .header("cookie", format!("csrf_token={}", csrf_cookie))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn get_authed(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn login(app: &Router, email: &str, password: &str) -> Option<String> {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "email": email, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, json) = read_json(response).await;
    if status != StatusCode::OK {
        return None;
    }
    json["access_token"].as_str().map(|s| s.to_string())
}

/// The bootstrap super admin: registered on first use, logged in after
pub async fn super_admin_token(app: &Router) -> String {
    if let Some(token) = login(app, SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD).await {
        return token;
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "email": SUPER_ADMIN_EMAIL,
                        "password": SUPER_ADMIN_PASSWORD,
                        "full_name": "Root Admin",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, json) = read_json(response).await;
    if status == StatusCode::CREATED {
        return json["access_token"].as_str().unwrap().to_string();
    }

    // Lost the bootstrap race to a parallel test; log in instead
    login(app, SUPER_ADMIN_EMAIL, SUPER_ADMIN_PASSWORD)
        .await
        .expect("super admin login after bootstrap race")
}

pub struct TestUniversity {
    pub university_id: String,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_token: String,
}

/// Create a university (with admin), plus a license package with `seats`
pub async fn create_university_with_seats(
    app: &Router,
    super_token: &str,
    seats: i64,
) -> TestUniversity {
    let admin_email = format!("univ-admin-{}@test.com", Uuid::new_v4());
    let admin_password = "UnivAdmin123!".to_string();

    let response = post_json(
        app,
        "/admin/universities",
        super_token,
        json!({
            "name": format!("Test University {}", Uuid::new_v4()),
            "admin_email": admin_email,
            "admin_password": admin_password,
            "admin_full_name": "University Admin",
            "license_limit": seats,
        }),
    )
    .await;

    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "university create: {}", json);
    let university_id = json["id"].as_str().unwrap().to_string();

    let response = post_json(
        app,
        "/admin/licenses",
        super_token,
        json!({
            "university_id": university_id,
            "total_licenses": seats,
            "price_per_license": 25.0,
        }),
    )
    .await;
    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "license create: {}", json);

    let admin_token = login(app, &admin_email, &admin_password)
        .await
        .expect("university admin login");

    TestUniversity {
        university_id,
        admin_email,
        admin_password,
        admin_token,
    }
}

pub struct TestStudent {
    pub student_id: String,
    pub email: String,
    pub password: String,
    pub token: String,
}

/// Provision a student under the given university admin and log them in
pub async fn provision_student(app: &Router, admin_token: &str) -> TestStudent {
    let email = format!("student-{}@test.com", Uuid::new_v4());
    let password = "Student123!".to_string();

    let response = post_json(
        app,
        "/university/students",
        admin_token,
        json!({
            "full_name": "Test Student",
            "email": email,
            "password": password,
            "username": format!("student{}", &Uuid::new_v4().simple().to_string()[..8]),
        }),
    )
    .await;

    let (status, json) = read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "provision: {}", json);
    let student_id = json["student_id"].as_str().unwrap().to_string();

    let token = login(app, &email, &password).await.expect("student login");

    TestStudent {
        student_id,
        email,
        password,
        token,
    }
}
