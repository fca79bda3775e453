use crate::api::AppState;
use crate::engine::trend::{compute_trend, DEFAULT_LOOKBACK_DAYS, LOOKBACK_BUFFER_DAYS};
use crate::engine::TrendReport;
use crate::error::AppError;
use crate::store::CompanyHistory;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

pub const DEFAULT_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<i64>,
}

pub async fn get_history(
    Path(company): Path<String>,
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<CompanyHistory>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if days < 0 {
        return Err(AppError::BadRequest("days must be >= 0".into()));
    }
    state
        .store
        .load_history(&company, days)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No history for {}", company)))
}

pub async fn get_trend(
    Path(company): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TrendReport>, AppError> {
    let today = Utc::now().date_naive();
    let window = state.store.load_history_at(
        &company,
        DEFAULT_LOOKBACK_DAYS + LOOKBACK_BUFFER_DAYS,
        today,
    )?;
    Ok(Json(
        window
            .map(|history| compute_trend(&history, today, DEFAULT_LOOKBACK_DAYS))
            .unwrap_or_else(TrendReport::no_data),
    ))
}
