//! Integration tests for abatrack-api endpoints
//!
//! Each test runs against a fresh SQLite database in a temp directory and
//! drives the router directly with `oneshot`, no listening socket needed.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

use abatrack_api::{build_router, AppState};

/// Fresh app over a throwaway database. The TempDir must stay alive for
/// the duration of the test.
async fn setup_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("abatrack.db");
    let pool = abatrack_common::db::init_database(&db_path)
        .await
        .expect("Should initialize database");
    (build_router(AppState::new(pool)), dir)
}

fn request(method: &str, uri: &str, role: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header("x-abatrack-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// POST as BCBA and return the parsed JSON body, asserting 201
async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(request("POST", uri, Some("BCBA"), Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "POST {}", uri);
    extract_json(response.into_body()).await
}

async fn create_client(app: &Router, name: &str) -> String {
    let body = create(
        app,
        "/api/clients",
        json!({"name": name, "birthdate": "2018-04-01"}),
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

async fn create_behavior(app: &Router, client_id: &str, name: &str, method: &str) -> String {
    let mut payload = json!({"name": name, "method": method});
    if method == "INTERVAL" || method == "MTS" {
        payload["settings"] = json!({"interval_seconds": 30});
    }
    let body = create(
        app,
        &format!("/api/clients/{}/behaviors", client_id),
        payload,
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

async fn create_skill(app: &Router, client_id: &str, name: &str) -> String {
    let body = create(
        app,
        &format!("/api/clients/{}/skills", client_id),
        json!({"name": name, "skill_type": "MAND"}),
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

async fn start_session(app: &Router, client_id: &str) -> String {
    let body = create(
        app,
        "/api/sessions/start",
        json!({"client_id": client_id, "date": "2026-08-20"}),
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

async fn post_events(app: &Router, session_id: &str, events: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/sessions/{}/events", session_id),
            Some("RBT"),
            Some(json!({ "events": events })),
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn post_skill_events(app: &Router, session_id: &str, events: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/sessions/{}/skill-events", session_id),
            Some("RBT"),
            Some(json!({ "events": events })),
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let response = app
        .clone()
        .oneshot(request("GET", uri, Some("BCBA"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "GET {}", uri);
    extract_json(response.into_body()).await
}

// =============================================================================
// Health and authorization
// =============================================================================

#[tokio::test]
async fn health_requires_no_auth() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request("GET", "/api/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "abatrack-api");
}

#[tokio::test]
async fn missing_role_header_is_unauthorized() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request("GET", "/api/collect/clients", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Auth failures use the same error envelope as everything else
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn rbt_cannot_reach_bcba_surface() {
    let (app, _dir) = setup_app().await;

    for uri in ["/api/sessions", "/api/clients"] {
        let response = app
            .clone()
            .oneshot(request("GET", uri, Some("RBT"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "GET {}", uri);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    let session_delete = request("DELETE", "/api/sessions/00000000-0000-0000-0000-000000000000", Some("RBT"), None);
    let response = app.oneshot(session_delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rbt_can_use_collection_surface() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request("GET", "/api/collect/clients", Some("RBT"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn create_and_list_clients() {
    let (app, _dir) = setup_app().await;

    let id = create_client(&app, "Alex").await;

    let clients = get_json(&app, "/api/clients").await;
    assert_eq!(clients.as_array().unwrap().len(), 1);
    assert_eq!(clients[0]["id"], id.as_str());
    assert_eq!(clients[0]["name"], "Alex");

    let fetched = get_json(&app, &format!("/api/clients/{}", id)).await;
    assert_eq!(fetched["birthdate"], "2018-04-01");
}

#[tokio::test]
async fn client_requires_valid_birthdate() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/clients",
            Some("BCBA"),
            Some(json!({"name": "Alex", "birthdate": "not-a-date"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn interval_behavior_requires_interval_seconds() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/clients/{}/behaviors", client_id),
            Some("BCBA"),
            Some(json!({"name": "On task", "method": "MTS"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // With a positive interval it goes through
    create_behavior(&app, &client_id, "On task", "MTS").await;
}

#[tokio::test]
async fn behaviors_for_unknown_client_is_not_found() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request(
            "GET",
            "/api/clients/00000000-0000-0000-0000-000000000000/behaviors",
            Some("BCBA"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Session lifecycle and event intake
// =============================================================================

#[tokio::test]
async fn start_session_for_unknown_client_is_not_found() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/sessions/start",
            Some("RBT"),
            Some(json!({
                "client_id": "00000000-0000-0000-0000-000000000000",
                "date": "2026-08-20"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_insert_reports_created_count() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let session_id = start_session(&app, &client_id).await;

    let (status, body) = post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "DEC", "value": -1},
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["created"], 3);
}

#[tokio::test]
async fn event_type_must_match_collection_method() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let session_id = start_session(&app, &client_id).await;

    // STOP on a FREQUENCY behavior rejects the whole batch
    let (status, _) = post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "STOP", "value": 42},
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing from the rejected batch was persisted
    let details = get_json(&app, &format!("/api/sessions/{}/details", session_id)).await;
    assert!(details["behaviors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn events_for_another_clients_behavior_are_rejected() {
    let (app, _dir) = setup_app().await;
    let client_a = create_client(&app, "Alex").await;
    let client_b = create_client(&app, "Blair").await;
    let foreign_behavior = create_behavior(&app, &client_b, "Elopement", "FREQUENCY").await;
    let session_id = start_session(&app, &client_a).await;

    let (status, _) = post_events(
        &app,
        &session_id,
        json!([{"behavior_id": foreign_behavior, "event_type": "INC", "value": 1}]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ended_session_rejects_new_events_with_conflict() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let skill_id = create_skill(&app, &client_id, "Requests break").await;
    let session_id = start_session(&app, &client_id).await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/sessions/{}/end", session_id),
            Some("RBT"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ended = extract_json(response.into_body()).await;
    assert!(ended["ended_at"].is_string());

    let (status, _) = post_events(
        &app,
        &session_id,
        json!([{"behavior_id": behavior_id, "event_type": "INC", "value": 1}]),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_skill_events(
        &app,
        &session_id,
        json!([{"skill_id": skill_id, "event_type": "CORRECT"}]),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Ending twice is also a conflict
    let response = app
        .oneshot(request(
            "POST",
            &format!("/api/sessions/{}/end", session_id),
            Some("RBT"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn session_list_filters_by_client() {
    let (app, _dir) = setup_app().await;
    let client_a = create_client(&app, "Alex").await;
    let client_b = create_client(&app, "Blair").await;
    start_session(&app, &client_a).await;
    start_session(&app, &client_a).await;
    start_session(&app, &client_b).await;

    let all = get_json(&app, "/api/sessions").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let only_a = get_json(&app, &format!("/api/sessions?client_id={}", client_a)).await;
    assert_eq!(only_a.as_array().unwrap().len(), 2);
    for s in only_a.as_array().unwrap() {
        assert_eq!(s["client_id"], client_a.as_str());
    }

    let none = get_json(
        &app,
        "/api/sessions?date_from=2001-01-01&date_to=2001-12-31",
    )
    .await;
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn session_details_groups_events_by_target() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let skill_id = create_skill(&app, &client_id, "Requests break").await;
    let session_id = start_session(&app, &client_id).await;

    post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
        ]),
    )
    .await;
    post_skill_events(
        &app,
        &session_id,
        json!([
            {"skill_id": skill_id, "event_type": "CORRECT"},
            {"skill_id": skill_id, "event_type": "WRONG"},
        ]),
    )
    .await;

    let details = get_json(&app, &format!("/api/sessions/{}/details", session_id)).await;
    assert_eq!(details["id"], session_id.as_str());
    let behaviors = details["behaviors"].as_array().unwrap();
    assert_eq!(behaviors.len(), 1);
    assert_eq!(behaviors[0]["behavior"]["name"], "Aggression");
    assert_eq!(behaviors[0]["events"].as_array().unwrap().len(), 2);
    let skills = details["skills"].as_array().unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0]["events"].as_array().unwrap().len(), 2);

    // Counts surface in the review list too
    let sessions = get_json(&app, "/api/sessions").await;
    assert_eq!(sessions[0]["behavior_event_count"], 2);
    assert_eq!(sessions[0]["skill_event_count"], 2);
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn frequency_analysis_sums_inc_and_dec() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let session_id = start_session(&app, &client_id).await;

    // Net count: +1 +1 -1 = 1
    post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "DEC", "value": -1},
        ]),
    )
    .await;

    let analysis = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    assert_eq!(analysis["behavior"]["method"], "FREQUENCY");
    let points = analysis["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 1);
    assert_eq!(points[0]["session_count"], 1);

    // Re-reading is idempotent: derived, never accumulated
    let again = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    assert_eq!(again["points"], analysis["points"]);
}

#[tokio::test]
async fn duration_analysis_sums_stop_seconds_only() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Tantrum", "DURATION").await;
    let session_id = start_session(&app, &client_id).await;

    post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "START"},
            {"behavior_id": behavior_id, "event_type": "STOP", "value": 42},
            {"behavior_id": behavior_id, "event_type": "START"},
            {"behavior_id": behavior_id, "event_type": "STOP", "value": 8},
        ]),
    )
    .await;

    let analysis = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    let points = analysis["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 50);
}

#[tokio::test]
async fn interval_analysis_counts_hits() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "On task", "INTERVAL").await;
    let session_id = start_session(&app, &client_id).await;

    post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "HIT"},
            {"behavior_id": behavior_id, "event_type": "HIT"},
            {"behavior_id": behavior_id, "event_type": "HIT"},
        ]),
    )
    .await;

    let analysis = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    assert_eq!(analysis["points"][0]["value"], 3);
}

#[tokio::test]
async fn skill_analysis_rounds_percent_correct() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let skill_id = create_skill(&app, &client_id, "Requests break").await;
    let session_id = start_session(&app, &client_id).await;

    // 2 correct of 3 trials -> round(66.67) = 67
    post_skill_events(
        &app,
        &session_id,
        json!([
            {"skill_id": skill_id, "event_type": "CORRECT"},
            {"skill_id": skill_id, "event_type": "CORRECT"},
            {"skill_id": skill_id, "event_type": "WRONG"},
        ]),
    )
    .await;

    let analysis = get_json(
        &app,
        &format!("/api/analysis/skill/{}/session-points", skill_id),
    )
    .await;
    assert_eq!(analysis["skill"]["method"], "PERCENTAGE");
    let points = analysis["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 67);
    assert_eq!(points[0]["session_count"], 1);
}

#[tokio::test]
async fn analysis_merges_sessions_on_same_date() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;

    for _ in 0..2 {
        let session_id = start_session(&app, &client_id).await;
        post_events(
            &app,
            &session_id,
            json!([{"behavior_id": behavior_id, "event_type": "INC", "value": 1}]),
        )
        .await;
    }

    let analysis = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    let points = analysis["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["value"], 2);
    assert_eq!(points[0]["session_count"], 2);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn deleting_an_event_updates_analysis() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let session_id = start_session(&app, &client_id).await;

    post_events(
        &app,
        &session_id,
        json!([
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
            {"behavior_id": behavior_id, "event_type": "INC", "value": 1},
        ]),
    )
    .await;

    let details = get_json(&app, &format!("/api/sessions/{}/details", session_id)).await;
    let event_id = details["behaviors"][0]["events"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/sessions/events/behavior/{}", event_id),
            Some("BCBA"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Deleting the same event again is a clean 404
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/sessions/events/behavior/{}", event_id),
            Some("BCBA"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let analysis = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    assert_eq!(analysis["points"][0]["value"], 1);
}

#[tokio::test]
async fn deleting_a_session_cascades_to_events() {
    let (app, _dir) = setup_app().await;
    let client_id = create_client(&app, "Alex").await;
    let behavior_id = create_behavior(&app, &client_id, "Aggression", "FREQUENCY").await;
    let skill_id = create_skill(&app, &client_id, "Requests break").await;
    let session_id = start_session(&app, &client_id).await;

    post_events(
        &app,
        &session_id,
        json!([{"behavior_id": behavior_id, "event_type": "INC", "value": 1}]),
    )
    .await;
    post_skill_events(
        &app,
        &session_id,
        json!([{"skill_id": skill_id, "event_type": "CORRECT"}]),
    )
    .await;

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/sessions/{}", session_id),
            Some("BCBA"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Session gone from the review list, events gone from analysis
    let sessions = get_json(&app, "/api/sessions").await;
    assert!(sessions.as_array().unwrap().is_empty());

    let behavior = get_json(
        &app,
        &format!("/api/analysis/behavior/{}/session-points", behavior_id),
    )
    .await;
    assert!(behavior["points"].as_array().unwrap().is_empty());

    let skill = get_json(
        &app,
        &format!("/api/analysis/skill/{}/session-points", skill_id),
    )
    .await;
    assert!(skill["points"].as_array().unwrap().is_empty());

    let response = app
        .oneshot(request(
            "DELETE",
            &format!("/api/sessions/{}", session_id),
            Some("BCBA"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
