//! Direction of short interest over a trailing window.

use crate::store::history::CompanyHistory;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
/// Extra days loaded beyond the lookback so a past point can be found.
pub const LOOKBACK_BUFFER_DAYS: i64 = 5;
/// Minimum absolute change, in percentage points, to count as a direction.
pub const DIRECTION_THRESHOLD: f64 = 0.3;
pub const STRONG_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTrend {
    StrongUp,
    Up,
    Stable,
    Down,
    StrongDown,
    /// Fewer than two data points.
    NoData,
}

impl ShortTrend {
    pub fn from_change(change: f64) -> Self {
        if change.abs() < DIRECTION_THRESHOLD {
            ShortTrend::Stable
        } else if change >= STRONG_THRESHOLD {
            ShortTrend::StrongUp
        } else if change > 0.0 {
            ShortTrend::Up
        } else if change <= -STRONG_THRESHOLD {
            ShortTrend::StrongDown
        } else {
            ShortTrend::Down
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub trend: ShortTrend,
    pub change: f64,
    pub current: Option<f64>,
    pub past: Option<f64>,
    pub current_date: Option<NaiveDate>,
    pub past_date: Option<NaiveDate>,
}

impl TrendReport {
    pub fn no_data() -> Self {
        Self {
            trend: ShortTrend::NoData,
            change: 0.0,
            current: None,
            past: None,
            current_date: None,
            past_date: None,
        }
    }
}

/// Compare the latest point against the one `lookback_days` before `today`.
///
/// The past point is the latest entry on or before the target date, or the
/// oldest entry when none is that old. Only entries within
/// `lookback_days + LOOKBACK_BUFFER_DAYS` are considered.
pub fn compute_trend(
    history: &CompanyHistory,
    today: NaiveDate,
    lookback_days: i64,
) -> TrendReport {
    let earliest = today - Duration::days(lookback_days + LOOKBACK_BUFFER_DAYS);
    let points: Vec<_> = history
        .history
        .iter()
        .filter(|(day, _)| **day >= earliest)
        .collect();

    if points.len() < 2 {
        return TrendReport::no_data();
    }

    let (current_date, current) = points[points.len() - 1];
    let target = today - Duration::days(lookback_days);
    let (past_date, past) = points
        .iter()
        .rev()
        .find(|(day, _)| **day <= target)
        .copied()
        .unwrap_or(points[0]);

    let change = current.percentage - past.percentage;
    TrendReport {
        trend: ShortTrend::from_change(change),
        change,
        current: Some(current.percentage),
        past: Some(past.percentage),
        current_date: Some(*current_date),
        past_date: Some(*past_date),
    }
}
