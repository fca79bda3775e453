use crate::api::AppState;
use crate::error::AppError;
use crate::store::PublishedFile;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

/// Serve one published file byte-for-byte, for HTTP transports.
pub async fn get_file(
    Path(file): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let published = PublishedFile::from_file_name(&file)
        .ok_or_else(|| AppError::NotFound(format!("No published file named {}", file)))?;
    let bytes = state.store.read_raw(published)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes))
}
