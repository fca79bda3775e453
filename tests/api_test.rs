mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common::positions;
use nordshort::api::{self, AppState};
use nordshort::domain::Snapshot;
use nordshort::SnapshotStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn setup_test_app(dir: &TempDir) -> axum::Router {
    let store = Arc::new(SnapshotStore::new(dir.path()));
    api::create_router(AppState::new(store))
}

/// Publish three daily snapshots ending today; Company 0 rises 0.4 points a day.
fn seed(dir: &TempDir) -> Snapshot {
    let store = SnapshotStore::new(dir.path());
    let now = Utc::now();
    let mut last = None;
    for days_ago in (0..3).rev() {
        let at = now - Duration::days(days_ago * 4);
        let mut batch = positions(12, at);
        batch[0].percentage = 3.0 - 0.4 * days_ago as f64;
        let snapshot = Snapshot::new(at, "test", batch, BTreeMap::new());
        store.save(&snapshot).unwrap();
        last = Some(snapshot);
    }
    last.unwrap()
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(setup_test_app(&dir), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_reports_data() {
    let dir = TempDir::new().unwrap();
    let (_, body) = get(setup_test_app(&dir), "/ready").await;
    assert_eq!(body["has_data"], false);

    seed(&dir);
    let (status, body) = get(setup_test_app(&dir), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_data_serves_published_files() {
    let dir = TempDir::new().unwrap();
    let snapshot = seed(&dir);

    let (status, body) = get(setup_test_app(&dir), "/data/short_positions_current.json").await;
    assert_eq!(status, StatusCode::OK);
    let served: Snapshot = serde_json::from_value(body).unwrap();
    assert_eq!(served, snapshot);

    let (status, body) = get(setup_test_app(&dir), "/data/short_positions_historical.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("Company 0").is_some());
}

#[tokio::test]
async fn test_data_missing_and_unknown_files_are_404() {
    let dir = TempDir::new().unwrap();

    let (status, body) = get(setup_test_app(&dir), "/data/short_positions_meta.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"],
        "short_positions_meta.json has not been published yet"
    );

    let (status, _) = get(setup_test_app(&dir), "/data/last_valid_data.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_window() {
    let dir = TempDir::new().unwrap();
    seed(&dir);

    let (status, body) = get(setup_test_app(&dir), "/v1/history/Company%200").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_object().unwrap().len(), 3);

    let (_, body) = get(setup_test_app(&dir), "/v1/history/Company%200?days=5").await;
    assert_eq!(body["history"].as_object().unwrap().len(), 2);

    let (status, body) = get(
        setup_test_app(&dir),
        "/v1/history/Company%200?days=9223372036854775",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_object().unwrap().len(), 3);

    let (status, _) = get(setup_test_app(&dir), "/v1/history/Company%200?days=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(setup_test_app(&dir), "/v1/history/Nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trend_endpoint() {
    let dir = TempDir::new().unwrap();
    seed(&dir);

    let (status, body) = get(setup_test_app(&dir), "/v1/trend/Company%200").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trend"], "strong_up");

    let (_, body) = get(setup_test_app(&dir), "/v1/trend/Company%201").await;
    assert_eq!(body["trend"], "stable");

    let (status, body) = get(setup_test_app(&dir), "/v1/trend/Nobody").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trend"], "no_data");
}
