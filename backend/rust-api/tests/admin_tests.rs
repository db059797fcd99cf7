use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

mod common;

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn created_university_appears_with_usage() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 10).await;

    let response = common::get_authed(&app, "/admin/universities", &super_token).await;
    let (status, rows) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "{}", rows);

    let row = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["university_id"] == university.university_id.as_str())
        .expect("created university listed");

    assert_eq!(row["total_licenses"], 10);
    assert_eq!(row["used_licenses"], 0);
    assert_eq!(row["remaining_licenses"], 10);
    assert_eq!(row["admin_email"], university.admin_email.as_str());
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn license_package_rejects_non_positive_seat_count() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;

    let response = common::post_json(
        &app,
        "/admin/licenses",
        &super_token,
        json!({
            "university_id": university.university_id,
            "total_licenses": 0,
        }),
    )
    .await;
    let (status, body) = common::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn provisioning_stops_at_the_license_limit() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    // One single seat in the pool
    let university = common::create_university_with_seats(&app, &super_token, 1).await;

    // First student takes the seat
    let _first = common::provision_student(&app, &university.admin_token).await;

    // The second must be refused before anything is created
    let email = format!("overflow-{}@test.com", Uuid::new_v4());
    let response = common::post_json(
        &app,
        "/university/students",
        &university.admin_token,
        json!({
            "full_name": "Overflow Student",
            "email": email,
            "password": "Student123!",
            "username": "overflow1",
        }),
    )
    .await;
    let (status, body) = common::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    // No half-provisioned account can log in
    assert!(common::login(&app, &email, "Student123!").await.is_none());

    // The pool still shows exactly one seat used
    let response = common::get_authed(&app, "/university/stats", &university.admin_token).await;
    let (status, stats) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["used_licenses"], 1);
    assert_eq!(stats["remaining_licenses"], 0);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn force_stop_completes_with_score_from_ledger() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, snapshot) = common::read_json(response).await;
    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();

    // Two correct answers on the ledger before the stop
    for question in &snapshot["questions"].as_array().unwrap()[..2] {
        let question_id = question["id"].as_str().unwrap();
        let response = common::post_json(
            &app,
            &format!("/api/v1/quiz/sessions/{}/answers", session_id),
            &student.token,
            json!({ "question_id": question_id, "selected_answer": "B" }),
        )
        .await;
        let (status, _) = common::read_json(response).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = common::post_json(
        &app,
        &format!("/admin/sessions/{}/force-stop", session_id),
        &super_token,
        json!({}),
    )
    .await;
    let (status, stopped) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "{}", stopped);
    assert_eq!(stopped["status"], "completed");
    assert!(stopped["completed_at"].as_str().is_some());
    assert_eq!(stopped["correct_answers"], 2);
    assert_eq!(stopped["score"], 20);

    // The student's late submit bounces off the terminal state
    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/submit", session_id),
        &student.token,
        json!({}),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn university_admin_cannot_stop_foreign_sessions() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;

    let home = common::create_university_with_seats(&app, &super_token, 5).await;
    let away = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &home.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, snapshot) = common::read_json(response).await;
    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();

    let response = common::post_json(
        &app,
        &format!("/university/sessions/{}/force-stop", session_id),
        &away.admin_token,
        json!({}),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn platform_stats_render_for_super_admin() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let _university = common::create_university_with_seats(&app, &super_token, 3).await;

    let response = common::get_authed(&app, "/admin/stats", &super_token).await;
    let (status, stats) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "{}", stats);
    assert!(stats["universities"].as_u64().unwrap() >= 1);
    assert!(stats["total_licenses"].as_i64().unwrap() >= 3);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn provisioning_leaves_a_notification() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let _student = common::provision_student(&app, &university.admin_token).await;

    let response =
        common::get_authed(&app, "/api/v1/notifications", &university.admin_token).await;
    let (status, notifications) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "{}", notifications);
    assert!(notifications
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["type"] == "student_provisioned"));
}
