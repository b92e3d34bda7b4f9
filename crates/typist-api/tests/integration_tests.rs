//! Integration tests for the Typist API.
//!
//! Covers every route's happy path, the error-to-status mapping and bearer
//! authentication. Each test builds its own state with an in-memory settings
//! store and a recording injector, so nothing touches the real keyboard.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio_stream::StreamExt;
use tower::ServiceExt;
use uuid::Uuid;

use typist_api::create_router;
use typist_api::error::ErrorBody;
use typist_api::handlers::{
    CalibrationCancelResponse, CalibrationStartResponse, CommandResponse, HealthResponse,
    ProfilesResponse, SpeedResponse, StartSessionResponse,
};
use typist_api::state::AppState;
use typist_core::config::TypistConfig;
use typist_core::types::{Profile, SessionSnapshot, SessionState};
use typist_engine::{
    CalibrationProgress, CalibrationResult, RecordingInjector, SessionEngine, StaticTextProvider,
};
use typist_storage::{MemorySettings, ProfileStore};

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";
const LONG_TEXT: &str = "The quick brown fox jumps over the lazy dog. \
    The quick brown fox jumps over the lazy dog.";

fn test_config() -> TypistConfig {
    let mut config = TypistConfig::default();
    config.engine.countdown_secs = 0;
    config.engine.rng_seed = Some(7);
    config
}

/// Fresh state without a text provider.
fn make_bare_state() -> AppState {
    let config = test_config();
    let engine = SessionEngine::new(&config, Arc::new(RecordingInjector::new()));
    let profiles = Arc::new(ProfileStore::load(Arc::new(MemorySettings::new())));
    let mut state = AppState::new(config, engine, profiles);
    state.api_token = TEST_TOKEN.to_string();
    state
}

/// Fresh state with a provider that always returns "generated text".
fn make_state() -> AppState {
    make_bare_state().with_provider(Arc::new(StaticTextProvider::new("generated text")))
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
}

fn authed_get(uri: &str) -> Request<Body> {
    authed("GET", uri).body(Body::empty()).unwrap()
}

fn authed_post_empty(uri: &str) -> Request<Body> {
    authed("POST", uri).body(Body::empty()).unwrap()
}

fn authed_json(method: &str, uri: &str, json: &str) -> Request<Body> {
    authed(method, uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Start a session through the API and return its id.
async fn start(app: &axum::Router, json: &str) -> Uuid {
    let resp = app
        .clone()
        .oneshot(authed_json("POST", "/sessions", json))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json::<StartSessionResponse>(resp).await.session_id
}

/// Let the worker leave `Starting` and reach its first delay.
async fn let_worker_run() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn current_state(app: &axum::Router) -> SessionState {
    let resp = app
        .clone()
        .oneshot(authed_get("/sessions/current"))
        .await
        .unwrap();
    body_json::<SessionSnapshot>(resp).await.state
}

// =============================================================================
// Public endpoints and auth
// =============================================================================

#[tokio::test]
async fn test_health_no_auth_required() {
    let resp = make_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = body_json(resp).await;
    assert_eq!(health.status, "healthy");
    assert!(health.active_session.is_none());
}

#[tokio::test]
async fn test_auth_missing_token_returns_401() {
    let resp = make_app()
        .oneshot(Request::get("/profiles").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "unauthorized");
}

#[tokio::test]
async fn test_auth_invalid_token_returns_401() {
    let resp = make_app()
        .oneshot(
            Request::get("/profiles")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_malformed_header_returns_401() {
    let resp = make_app()
        .oneshot(
            Request::get("/profiles")
                .header("authorization", format!("Basic {}", TEST_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_required_on_all_protected_endpoints() {
    let id = Uuid::new_v4();
    let endpoints = [
        ("POST", "/sessions".to_string()),
        ("GET", "/sessions/current".to_string()),
        ("GET", format!("/sessions/{}", id)),
        ("POST", format!("/sessions/{}/pause", id)),
        ("POST", format!("/sessions/{}/resume", id)),
        ("POST", format!("/sessions/{}/stop", id)),
        ("PUT", format!("/sessions/{}/speed", id)),
        ("GET", "/events".to_string()),
        ("GET", "/profiles".to_string()),
        ("GET", "/profiles/fast".to_string()),
        ("GET", "/profiles/custom".to_string()),
        ("PUT", "/profiles/custom".to_string()),
        ("POST", "/calibration/start".to_string()),
        ("POST", "/calibration/input".to_string()),
        ("POST", "/calibration/complete".to_string()),
        ("DELETE", "/calibration".to_string()),
    ];

    let app = make_app();
    for (method, uri) in endpoints {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            resp.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require auth",
            method,
            uri
        );
    }
}

// =============================================================================
// Starting sessions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_session_returns_created() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/sessions",
            r#"{"text": "hello world", "profile": "fast", "overrides": {"countdown_secs": 3}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let started: StartSessionResponse = body_json(resp).await;
    assert_eq!(started.profile, "Fast");
    assert_eq!(started.total_chars, 11);

    let resp = app
        .clone()
        .oneshot(authed_get(&format!("/sessions/{}", started.session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let snapshot: SessionSnapshot = body_json(resp).await;
    assert_eq!(snapshot.state, SessionState::Starting);
    assert_eq!(snapshot.profile_name, "Fast");

    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let health: HealthResponse = body_json(resp).await;
    assert_eq!(health.active_session, Some(started.session_id));
}

#[tokio::test(start_paused = true)]
async fn test_start_from_prompt_uses_provider() {
    let app = make_app();
    let resp = app
        .oneshot(authed_json(
            "POST",
            "/sessions",
            r#"{"prompt": "write something", "profile": "Medium"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let started: StartSessionResponse = body_json(resp).await;
    assert_eq!(started.total_chars, "generated text".len());
}

#[tokio::test(start_paused = true)]
async fn test_start_from_prompt_without_provider_returns_502() {
    let app = create_router(make_bare_state());
    let resp = app
        .oneshot(authed_json("POST", "/sessions", r#"{"prompt": "write something"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorBody = body_json(resp).await;
    assert_eq!(body.error, "bad_gateway");
}

#[tokio::test(start_paused = true)]
async fn test_start_validation_errors_return_400() {
    let app = make_app();
    let bodies = [
        r#"{"text": "a", "prompt": "b"}"#,
        r#"{"profile": "Medium"}"#,
        r#"{"text": ""}"#,
        r#"{"text": "hello", "profile": "Glacial"}"#,
        r#"{"text": "hello", "overrides": {"custom_wpm": -5}}"#,
        r#"{"text": "hello", "overrides": {"delayed_correction": {"enabled": true, "delay_seconds": -1}}}"#,
    ];
    for json in bodies {
        let resp = app
            .clone()
            .oneshot(authed_json("POST", "/sessions", json))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", json);
        let body: ErrorBody = body_json(resp).await;
        assert_eq!(body.error, "bad_request");
    }

    // Nothing was started.
    let resp = app.oneshot(authed_get("/sessions/current")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_returns_conflict() {
    let app = make_app();
    let first = start(&app, &format!(r#"{{"text": "{}"}}"#, LONG_TEXT)).await;

    let resp = app
        .clone()
        .oneshot(authed_json("POST", "/sessions", r#"{"text": "other"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: ErrorBody = body_json(resp).await;
    assert!(body.message.contains(&first.to_string()));

    // Busy takes precedence over invalid input.
    for json in [
        r#"{"text": ""}"#,
        r#"{"text": "hello", "profile": "Glacial"}"#,
        r#"{"profile": "Medium"}"#,
    ] {
        let resp = app
            .clone()
            .oneshot(authed_json("POST", "/sessions", json))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT, "{}", json);
    }

    let resp = app.oneshot(authed_get("/sessions/current")).await.unwrap();
    let snapshot: SessionSnapshot = body_json(resp).await;
    assert_eq!(snapshot.id, first);
}

// =============================================================================
// Session commands
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_session_command_lifecycle() {
    let app = make_app();
    let id = start(&app, &format!(r#"{{"text": "{}"}}"#, LONG_TEXT)).await;
    let_worker_run().await;
    assert_eq!(current_state(&app).await, SessionState::Typing);

    let resp = app
        .clone()
        .oneshot(authed_post_empty(&format!("/sessions/{}/pause", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: CommandResponse = body_json(resp).await;
    assert_eq!(ack.state, SessionState::Paused);

    let resp = app
        .clone()
        .oneshot(authed_post_empty(&format!("/sessions/{}/pause", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            &format!("/sessions/{}/speed", id),
            r#"{"wpm": 9999}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let speed: SpeedResponse = body_json(resp).await;
    assert_eq!(speed.wpm, 500.0);

    let resp = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            &format!("/sessions/{}/speed", id),
            r#"{"wpm": 0}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .clone()
        .oneshot(authed_post_empty(&format!("/sessions/{}/resume", id)))
        .await
        .unwrap();
    let ack: CommandResponse = body_json(resp).await;
    assert_eq!(ack.state, SessionState::Typing);

    let resp = app
        .clone()
        .oneshot(authed_post_empty(&format!("/sessions/{}/stop", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: CommandResponse = body_json(resp).await;
    assert_eq!(ack.state, SessionState::Stopped);

    // Commands after stop.
    let resp = app
        .clone()
        .oneshot(authed_post_empty(&format!("/sessions/{}/resume", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            &format!("/sessions/{}/speed", id),
            r#"{"wpm": 80}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = app
        .oneshot(authed_post_empty(&format!("/sessions/{}/stop", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_starting_returns_conflict() {
    let app = make_app();
    let id = start(&app, r#"{"text": "hello", "overrides": {"countdown_secs": 3}}"#).await;
    let_worker_run().await;
    let resp = app
        .oneshot(authed_post_empty(&format!("/sessions/{}/pause", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: ErrorBody = body_json(resp).await;
    assert!(body.message.contains("starting"));
}

#[tokio::test(start_paused = true)]
async fn test_session_runs_to_completion() {
    let app = make_app();
    let id = start(
        &app,
        r#"{"text": "hi there", "profile": "Lightning", "overrides": {"typos_enabled": false, "pause_frequency": 0}}"#,
    )
    .await;

    let mut state = current_state(&app).await;
    for _ in 0..120 {
        if state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        state = current_state(&app).await;
    }
    assert_eq!(state, SessionState::Completed);

    let resp = app
        .clone()
        .oneshot(authed_get(&format!("/sessions/{}", id)))
        .await
        .unwrap();
    let snapshot: SessionSnapshot = body_json(resp).await;
    assert_eq!(snapshot.counters.chars_typed, 8);
    assert_eq!(snapshot.counters.total_chars, 8);
    assert!(snapshot.finished_at.is_some());

    // The next start without a profile reuses the last one.
    let resp = app
        .oneshot(authed_json("POST", "/sessions", r#"{"text": "again"}"#))
        .await
        .unwrap();
    let started: StartSessionResponse = body_json(resp).await;
    assert_eq!(started.profile, "Lightning");
}

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let app = make_app();
    let id = Uuid::new_v4();
    for request in [
        authed_get(&format!("/sessions/{}", id)),
        authed_post_empty(&format!("/sessions/{}/pause", id)),
        authed_post_empty(&format!("/sessions/{}/resume", id)),
        authed_post_empty(&format!("/sessions/{}/stop", id)),
        authed_json("PUT", &format!("/sessions/{}/speed", id), r#"{"wpm": 80}"#),
        authed_get("/sessions/current"),
    ] {
        let resp = app.clone().oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = body_json(resp).await;
        assert_eq!(body.error, "not_found");
    }
}

#[tokio::test]
async fn test_malformed_session_id_returns_400() {
    let resp = make_app()
        .oneshot(authed_get("/sessions/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Events
// =============================================================================

async fn next_frame(stream: &mut axum::body::BodyDataStream) -> String {
    let chunk = stream.next().await.unwrap().unwrap();
    String::from_utf8(chunk.to_vec()).unwrap()
}

#[tokio::test]
async fn test_events_stream_starts_with_ready() {
    let resp = make_app().oneshot(authed_get("/events")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut stream = resp.into_body().into_data_stream();
    let frame = next_frame(&mut stream).await;
    assert!(frame.contains("event:"));
    assert!(frame.contains("ready"));
    assert!(frame.contains(r#""session":null"#));
}

#[tokio::test(start_paused = true)]
async fn test_events_stream_carries_session_events() {
    let app = make_app();
    let resp = app.clone().oneshot(authed_get("/events")).await.unwrap();
    let mut stream = resp.into_body().into_data_stream();
    assert!(next_frame(&mut stream).await.contains("ready"));

    let id = start(&app, &format!(r#"{{"text": "{}"}}"#, LONG_TEXT)).await;
    let started = next_frame(&mut stream).await;
    assert!(started.contains("started"));
    assert!(started.contains(r#""seq":1"#));
    assert!(started.contains(&id.to_string()));

    // A filtered subscription opens with the session's snapshot.
    let resp = app
        .oneshot(authed_get(&format!("/events?session_id={}", id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let mut stream = resp.into_body().into_data_stream();
    let ready = next_frame(&mut stream).await;
    assert!(ready.contains("ready"));
    assert!(ready.contains(&id.to_string()));
}

#[tokio::test]
async fn test_events_for_unknown_session_returns_404() {
    let resp = make_app()
        .oneshot(authed_get(&format!("/events?session_id={}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Profiles
// =============================================================================

#[tokio::test]
async fn test_list_profiles() {
    let resp = make_app().oneshot(authed_get("/profiles")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list: ProfilesResponse = body_json(resp).await;
    let names: Vec<&str> = list.profiles.iter().map(|e| e.profile.name.as_str()).collect();
    assert_eq!(names, vec!["Slow", "Medium", "Fast", "Lightning", "Custom"]);
    assert!(list.profiles[..4].iter().all(|e| e.builtin));
    assert!(!list.profiles[4].builtin);
}

#[tokio::test]
async fn test_get_profile_case_insensitive() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(authed_get("/profiles/LIGHTNING"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let profile: Profile = body_json(resp).await;
    assert_eq!(profile, Profile::lightning());

    let resp = app.oneshot(authed_get("/profiles/glacial")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_custom_profile() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            "/profiles/custom",
            r#"{"name": "Mine", "min_delay_ms": 100, "max_delay_ms": 150, "typos_enabled": false}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let saved: Profile = body_json(resp).await;
    assert_eq!(saved.name, "Custom");
    assert_eq!(saved.min_delay_ms, 100);

    let resp = app
        .clone()
        .oneshot(authed_get("/profiles/custom"))
        .await
        .unwrap();
    let custom: Profile = body_json(resp).await;
    assert_eq!(custom, saved);

    let resp = app
        .oneshot(authed_json(
            "PUT",
            "/profiles/custom",
            r#"{"min_delay_ms": 500, "max_delay_ms": 100}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Calibration
// =============================================================================

#[tokio::test]
async fn test_calibration_flow() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let reference = body_json::<CalibrationStartResponse>(resp).await.reference;
    assert!(!reference.is_empty());

    let resp = app
        .clone()
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let prefix: String = reference.chars().take(10).collect();
    let resp = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/calibration/input",
            &serde_json::json!({ "typed": prefix }).to_string(),
        ))
        .await
        .unwrap();
    let progress: CalibrationProgress = body_json(resp).await;
    assert_eq!(progress.typed, 10);
    assert_eq!(progress.errors, 0);
    assert_eq!(progress.accuracy, 100.0);
    assert!(!progress.complete);

    let resp = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/calibration/input",
            &serde_json::json!({ "typed": reference }).to_string(),
        ))
        .await
        .unwrap();
    let progress: CalibrationProgress = body_json(resp).await;
    assert!(progress.complete);
    let result: CalibrationResult = progress.result.expect("full input completes");
    assert_eq!(result.accuracy, 100.0);
    assert_eq!(result.derived_profile.name, "Custom");
    assert!(!result.derived_profile.typos_enabled);

    let resp = app
        .clone()
        .oneshot(authed_get("/profiles/custom"))
        .await
        .unwrap();
    let custom: Profile = body_json(resp).await;
    assert_eq!(custom, result.derived_profile);

    // The measurement is finished, so a new one can start.
    let resp = app
        .clone()
        .oneshot(authed_post_empty("/calibration/complete"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = app
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_calibration_without_start_returns_conflict() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(authed_json("POST", "/calibration/input", r#"{"typed": "abc"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app
        .oneshot(authed_post_empty("/calibration/complete"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_calibration_without_input_is_unprocessable() {
    let app = make_app();
    app.clone()
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();
    let resp = app
        .clone()
        .oneshot(authed_post_empty("/calibration/complete"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // The failed measurement was discarded.
    let resp = app
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_calibration_cancel() {
    let app = make_app();
    app.clone()
        .oneshot(authed_post_empty("/calibration/start"))
        .await
        .unwrap();

    let delete = || authed("DELETE", "/calibration").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(delete()).await.unwrap();
    let cancelled: CalibrationCancelResponse = body_json(resp).await;
    assert!(cancelled.cancelled);

    let resp = app.oneshot(delete()).await.unwrap();
    let cancelled: CalibrationCancelResponse = body_json(resp).await;
    assert!(!cancelled.cancelled);
}

#[tokio::test]
async fn test_error_body_shape() {
    let resp = make_app()
        .oneshot(authed_get("/profiles/unknown"))
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("unknown"));
}
