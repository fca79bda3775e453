use crate::api::AppState;
use crate::store::PublishedFile;
use axum::extract::State;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once the publisher has produced a current snapshot.
pub async fn ready(State(state): State<AppState>) -> Json<serde_json::Value> {
    let has_data = state.store.path(PublishedFile::Current).exists();
    Json(serde_json::json!({
        "status": if has_data { "ready" } else { "waiting_for_data" },
        "has_data": has_data,
    }))
}
