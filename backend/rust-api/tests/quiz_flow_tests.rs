use axum::http::StatusCode;
use serde_json::json;

mod common;

/// End-to-end attempt: start, answer, flag for review, submit, score.
/// Seeded questions all have "B" as the correct answer.
#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn full_quiz_flow_scores_submitted_answers() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    // Start the attempt
    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (status, snapshot) = common::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "{}", snapshot);

    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(snapshot["session"]["status"], "active");
    assert_eq!(
        snapshot["questions"].as_array().unwrap().len(),
        common::SEEDED_QUESTIONS
    );
    assert!(snapshot["remaining_seconds"].as_i64().unwrap() > 0);
    // Correct answers never reach the client while the session is open
    assert!(snapshot["questions"][0].get("correct_answer").is_none());

    let questions: Vec<String> = snapshot["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect();

    // Answer the first three correctly, the fourth wrong
    for question_id in &questions[..3] {
        let response = common::post_json(
            &app,
            &format!("/api/v1/quiz/sessions/{}/answers", session_id),
            &student.token,
            json!({ "question_id": question_id, "selected_answer": "B" }),
        )
        .await;
        let (status, body) = common::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }

    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/answers", session_id),
        &student.token,
        json!({ "question_id": questions[3], "selected_answer": "A" }),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);

    // Submit: 3 of 10 correct -> 30
    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/submit", session_id),
        &student.token,
        json!({}),
    )
    .await;
    let (status, result) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "{}", result);
    assert_eq!(result["status"], "completed");
    assert_eq!(result["total_questions"], 10);
    assert_eq!(result["correct_answers"], 3);
    assert_eq!(result["score"], 30);
    assert!(result["completed_at"].as_str().is_some());

    // A second submit is rejected, not silently repeated
    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/submit", session_id),
        &student.token,
        json!({}),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The attempt shows up in results
    let response = common::get_authed(&app, "/api/v1/quiz/results", &student.token).await;
    let (status, results) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert!(results
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["id"] == session_id.as_str()));
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn repeated_selection_keeps_one_ledger_entry() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, snapshot) = common::read_json(response).await;
    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();
    let question_id = snapshot["questions"][0]["id"].as_str().unwrap().to_string();

    // Same selection several times, then a different one
    for option in ["A", "A", "C"] {
        let response = common::post_json(
            &app,
            &format!("/api/v1/quiz/sessions/{}/answers", session_id),
            &student.token,
            json!({ "question_id": question_id, "selected_answer": option }),
        )
        .await;
        let (status, _) = common::read_json(response).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Exactly one entry for the question, carrying the last option
    let response = common::get_authed(&app, "/api/v1/quiz/sessions/current", &student.token).await;
    let (status, current) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);

    let entries: Vec<&serde_json::Value> = current["answers"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["question_id"] == question_id.as_str())
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["selected_answer"], "C");
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn review_toggle_round_trips_and_keeps_selection() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, snapshot) = common::read_json(response).await;
    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();
    let question_id = snapshot["questions"][0]["id"].as_str().unwrap().to_string();

    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/answers", session_id),
        &student.token,
        json!({ "question_id": question_id, "selected_answer": "D" }),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);

    let review_uri = format!("/api/v1/quiz/sessions/{}/review", session_id);

    let response = common::post_json(
        &app,
        &review_uri,
        &student.token,
        json!({ "question_id": question_id }),
    )
    .await;
    let (status, flagged) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flagged["marked_for_review"], true);
    assert_eq!(flagged["selected_answer"], "D");

    let response = common::post_json(
        &app,
        &review_uri,
        &student.token,
        json!({ "question_id": question_id }),
    )
    .await;
    let (status, unflagged) = common::read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unflagged["marked_for_review"], false);
    assert_eq!(unflagged["selected_answer"], "D");
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn malformed_option_is_rejected_before_any_write() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, snapshot) = common::read_json(response).await;
    let session_id = snapshot["session"]["id"].as_str().unwrap().to_string();
    let question_id = snapshot["questions"][0]["id"].as_str().unwrap().to_string();

    // "E" is not one of the four labeled options
    let response = common::post_json(
        &app,
        &format!("/api/v1/quiz/sessions/{}/answers", session_id),
        &student.token,
        json!({ "question_id": question_id, "selected_answer": "E" }),
    )
    .await;
    let (status, _) = common::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The ledger stayed empty
    let response = common::get_authed(&app, "/api/v1/quiz/sessions/current", &student.token).await;
    let (_, current) = common::read_json(response).await;
    assert_eq!(current["answers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore = "requires local MongoDB and Redis (.env.test)"]
async fn starting_twice_resumes_the_same_session() {
    let app = common::create_test_app().await;
    let super_token = common::super_admin_token(&app).await;
    let university = common::create_university_with_seats(&app, &super_token, 5).await;
    let student = common::provision_student(&app, &university.admin_token).await;

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (_, first) = common::read_json(response).await;
    let first_id = first["session"]["id"].as_str().unwrap().to_string();

    let response = common::post_json(&app, "/api/v1/quiz/sessions", &student.token, json!({})).await;
    let (status, second) = common::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["session"]["id"], first_id.as_str());
}
