//! Integration tests for mos-rater API endpoints
//!
//! Tests cover:
//! - Health endpoint and UI assets
//! - Session lifecycle from first file to completion
//! - Stale and out-of-range submissions
//! - Failed store writes leave the session where it was
//! - Retries of a write that did land are deduplicated
//! - Concurrent sessions against one store
//! - Summary, raw ratings and CSV downloads
//! - Audio serving restricted to catalog files
//! - Empty audio folder surfaced as a configuration error

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mos_common::config::SummaryMode;
use mos_common::{MosSummary, NewRating, RatingRecord, RawRating};
use mos_rater::store::{AppendOutcome, MemoryStore, RatingStore, SharedStore, StoreError};
use mos_rater::{build_router, AppState, RatingOrchestrator};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

/// Store that fails a configurable number of appends before delegating
struct FlakyStore {
    inner: MemoryStore,
    failures_left: AtomicUsize,
}

impl FlakyStore {
    fn failing(times: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures_left: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl RatingStore for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("connection reset".to_string()));
        }
        self.inner.append(rating).await
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        self.inner.read_all().await
    }

    async fn publish_summary(&self, rows: &[MosSummary]) -> Result<(), StoreError> {
        self.inner.publish_summary(rows).await
    }
}

/// Store that keeps the row but reports the first append as failed,
/// like a remote write whose response was lost
struct LostAckStore {
    inner: MemoryStore,
    lost_acks_left: AtomicUsize,
}

#[async_trait]
impl RatingStore for LostAckStore {
    fn backend_name(&self) -> &'static str {
        "lost-ack"
    }

    async fn append(&self, rating: &NewRating) -> Result<AppendOutcome, StoreError> {
        let outcome = self.inner.append(rating).await?;
        let left = self.lost_acks_left.load(Ordering::SeqCst);
        if left > 0 {
            self.lost_acks_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("response timed out".to_string()));
        }
        Ok(outcome)
    }

    async fn read_all(&self) -> Result<Vec<RatingRecord>, StoreError> {
        self.inner.read_all().await
    }
}

struct TestApp {
    _dir: TempDir,
    router: Router,
}

/// Test helper: temp audio folder with `files`, router over `store`
fn setup_app_with(files: &[&str], store: SharedStore, mode: SummaryMode) -> TestApp {
    let dir = TempDir::new().unwrap();
    let audio = dir.path().join("audio_files");
    std::fs::create_dir(&audio).unwrap();
    for name in files {
        std::fs::write(audio.join(name), b"RIFF....WAVE").unwrap();
    }
    std::fs::write(dir.path().join("secret.wav"), b"not for you").unwrap();

    let orchestrator = RatingOrchestrator::new(store, audio, dir.path(), mode);
    TestApp {
        router: build_router(AppState::new(orchestrator)),
        _dir: dir,
    }
}

fn setup_app(files: &[&str]) -> TestApp {
    setup_app_with(files, Arc::new(MemoryStore::new()), SummaryMode::Eager)
}

/// Test helper: Create request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

async fn call(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

async fn start(app: &TestApp) -> Value {
    let (status, body) = call(app, test_request("POST", "/api/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn submit(app: &TestApp, token: &str, file: &str, rating: Value) -> (StatusCode, Value) {
    call(
        app,
        json_request(
            "POST",
            &format!("/api/sessions/{}/ratings", token),
            json!({ "audio_file": file, "rating": rating }),
        ),
    )
    .await
}

// =============================================================================
// Health and UI
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(&["a.wav"]);

    let (status, body) = call(&app, test_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "mos-rater");
    assert_eq!(body["backend"], "memory");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ui_assets_served() {
    let app = setup_app(&["a.wav"]);

    let response = app.router.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = extract_text(response.into_body()).await;
    assert!(html.contains("/static/app.js"));
    assert!(html.contains(r#"id="rater""#));

    // Downloads are reachable while a session is still running
    let admin = html.find(r#"id="admin""#).unwrap();
    let done = html.find(r#"id="done""#).unwrap();
    let download = html.find("/api/export/summary.csv").unwrap();
    assert!(download > admin && admin > done);

    let response = app
        .router
        .clone()
        .oneshot(test_request("GET", "/static/app.js"))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
    let script = extract_text(response.into_body()).await;
    assert!(script.contains("Rating as: "));
    assert!(script.contains("Could not reload the session"));
}

#[tokio::test]
async fn test_scale_has_five_labels() {
    let app = setup_app(&["a.wav"]);

    let (status, body) = call(&app, test_request("GET", "/api/scale")).await;
    assert_eq!(status, StatusCode::OK);
    let options = body["options"].as_array().unwrap();
    assert_eq!(options.len(), 5);
    assert_eq!(options[0]["label"], "1: Bad");
    assert_eq!(options[4]["label"], "5: Excellent");
    assert_eq!(body["default"], 3);
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_session_reaches_complete() {
    let app = setup_app(&["c.ogg", "a.wav", "b.mp3", "notes.txt"]);

    let session = start(&app).await;
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(session["total"], 3);
    assert_eq!(session["current_file"], "a.wav");
    assert_eq!(session["progress_label"], "File 1 of 3");
    assert!(session["user_id"].as_str().unwrap().starts_with("user_"));

    let (status, body) = submit(&app, &token, "a.wav", json!(4)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_index"], 1);
    assert_eq!(body["current_file"], "b.mp3");

    let (_, body) = submit(&app, &token, "b.mp3", json!("2: Poor")).await;
    assert_eq!(body["progress_label"], "File 3 of 3");

    let (_, body) = submit(&app, &token, "c.ogg", json!(5)).await;
    assert_eq!(body["progress"], "complete");
    assert_eq!(body["current_index"], 3);
    assert!(body["current_file"].is_null());

    let (status, body) = submit(&app, &token, "c.ogg", json!(5)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, summary) = call(&app, test_request("GET", "/api/summary")).await;
    let rows = summary["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["audio_file"], "a.wav");
    assert_eq!(rows[0]["mean_score"], 4.0);
    assert_eq!(rows[1]["mean_score"], 2.0);
}

#[tokio::test]
async fn test_stale_file_is_conflict() {
    let app = setup_app(&["a.wav", "b.wav"]);
    let session = start(&app).await;
    let token = session["token"].as_str().unwrap();

    let (status, body) = submit(&app, token, "b.wav", json!(3)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["retryable"], false);

    let (_, status) = call(&app, test_request("GET", &format!("/api/sessions/{}", token))).await;
    assert_eq!(status["current_index"], 0);
}

#[tokio::test]
async fn test_out_of_range_rating_rejected() {
    let app = setup_app(&["a.wav"]);
    let session = start(&app).await;
    let token = session["token"].as_str().unwrap();

    let (status, body) = submit(&app, token, "a.wav", json!(7)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_and_invalid_tokens() {
    let app = setup_app(&["a.wav"]);

    let unknown = uuid::Uuid::new_v4();
    let (status, body) = call(&app, test_request("GET", &format!("/api/sessions/{}", unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = call(&app, test_request("GET", "/api/sessions/not-a-token")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_end_session() {
    let app = setup_app(&["a.wav"]);
    let session = start(&app).await;
    let uri = format!("/api/sessions/{}", session["token"].as_str().unwrap());

    let response = app.router.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = call(&app, test_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Store failures
// =============================================================================

#[tokio::test]
async fn test_failed_append_does_not_advance() {
    let store = Arc::new(FlakyStore::failing(1));
    let app = setup_app_with(&["a.wav", "b.wav"], store.clone(), SummaryMode::Eager);
    let session = start(&app).await;
    let token = session["token"].as_str().unwrap();

    let (status, body) = submit(&app, token, "a.wav", json!(4)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    assert_eq!(body["error"]["retryable"], true);

    let (_, status) = call(&app, test_request("GET", &format!("/api/sessions/{}", token))).await;
    assert_eq!(status["current_index"], 0);
    assert!(store.read_all().await.unwrap().is_empty());

    let (status, body) = submit(&app, token, "a.wav", json!(4)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_index"], 1);
    assert_eq!(store.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_after_lost_ack_is_not_double_counted() {
    let store = Arc::new(LostAckStore {
        inner: MemoryStore::new(),
        lost_acks_left: AtomicUsize::new(1),
    });
    let app = setup_app_with(&["a.wav", "b.wav"], store.clone(), SummaryMode::Eager);
    let session = start(&app).await;
    let token = session["token"].as_str().unwrap();

    let (status, body) = submit(&app, token, "a.wav", json!(4)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["retryable"], true);

    let (_, status) = call(&app, test_request("GET", &format!("/api/sessions/{}", token))).await;
    assert_eq!(status["current_index"], 0);

    let (status, body) = submit(&app, token, "a.wav", json!(4)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_index"], 1);
    assert_eq!(body["current_file"], "b.wav");
    assert_eq!(store.read_all().await.unwrap().len(), 1);

    let (_, summary) = call(&app, test_request("GET", "/api/summary")).await;
    assert_eq!(summary["rows"][0]["count"], 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_sessions_both_retained() {
    let store = Arc::new(MemoryStore::new());
    let app = setup_app_with(&["a.wav"], store.clone(), SummaryMode::Lazy);

    let first = start(&app).await;
    let second = start(&app).await;
    assert_ne!(first["token"], second["token"]);
    assert_ne!(first["user_id"], second["user_id"]);

    let (one, two) = tokio::join!(
        submit(&app, first["token"].as_str().unwrap(), "a.wav", json!(5)),
        submit(&app, second["token"].as_str().unwrap(), "a.wav", json!(2)),
    );
    assert_eq!(one.0, StatusCode::OK);
    assert_eq!(two.0, StatusCode::OK);

    let (_, ratings) = call(&app, test_request("GET", "/api/ratings")).await;
    assert_eq!(ratings["count"], 2);

    let (_, summary) = call(&app, test_request("GET", "/api/summary")).await;
    assert_eq!(summary["summary_mode"], "lazy");
    assert_eq!(summary["rows"][0]["count"], 2);
    assert_eq!(summary["rows"][0]["mean_score"], 3.5);
}

// =============================================================================
// Summary and exports
// =============================================================================

#[tokio::test]
async fn test_malformed_rows_visible_but_not_aggregated() {
    let store = Arc::new(MemoryStore::with_records(vec![
        RatingRecord::new("user_1", "a.wav", RawRating::Integer(3)),
        RatingRecord::new("user_2", "a.wav", RawRating::Integer(5)),
        RatingRecord::new("user_3", "b.wav", RawRating::Integer(4)),
        RatingRecord::new("user_4", "b.wav", RawRating::Text("N/A".to_string())),
    ]));
    let app = setup_app_with(&["a.wav", "b.wav"], store, SummaryMode::Lazy);

    let (_, ratings) = call(&app, test_request("GET", "/api/ratings")).await;
    assert_eq!(ratings["count"], 4);
    assert_eq!(ratings["ratings"][3]["rating"], "N/A");

    let (_, summary) = call(&app, test_request("GET", "/api/summary")).await;
    assert_eq!(
        summary["rows"],
        json!([
            {"audio_file": "a.wav", "mean_score": 4.0, "count": 2},
            {"audio_file": "b.wav", "mean_score": 4.0, "count": 1},
        ])
    );
}

#[tokio::test]
async fn test_csv_exports() {
    let store = Arc::new(MemoryStore::with_records(vec![
        RatingRecord::new("user_1", "a.wav", RawRating::Integer(3)),
        RatingRecord::new("user_2", "a.wav", RawRating::Integer(4)),
    ]));
    let app = setup_app_with(&["a.wav"], store, SummaryMode::Lazy);

    let response = app
        .router
        .clone()
        .oneshot(test_request("GET", "/api/export/summary.csv"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"mos_summary.csv\""
    );
    let text = extract_text(response.into_body()).await;
    assert_eq!(text, "audio_file,MOS\na.wav,3.5\n");

    let response = app
        .router
        .clone()
        .oneshot(test_request("GET", "/api/export/ratings.csv"))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"all_mos_ratings.csv\""
    );
    let text = extract_text(response.into_body()).await;
    assert_eq!(text, "user_id,audio_file,rating\nuser_1,a.wav,3\nuser_2,a.wav,4\n");
}

// =============================================================================
// Audio serving
// =============================================================================

#[tokio::test]
async fn test_audio_only_from_catalog() {
    let app = setup_app(&["a.wav", "notes.txt"]);

    let response = app
        .router
        .clone()
        .oneshot(test_request("GET", "/api/audio/a.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");

    for uri in ["/api/audio/notes.txt", "/api/audio/..%2Fsecret.wav", "/api/audio/missing.wav"] {
        let (status, body) = call(&app, test_request("GET", uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

// =============================================================================
// Configuration errors
// =============================================================================

#[tokio::test]
async fn test_empty_audio_folder_is_configuration_error() {
    let app = setup_app(&["readme.txt"]);

    let (status, body) = call(&app, test_request("POST", "/api/sessions")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("No audio files found"));
}
