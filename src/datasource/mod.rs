//! Regulator sources that produce canonical short positions.
//!
//! Every source converts its own row shape into [`ShortPosition`] at this
//! boundary; nothing downstream sees source-specific data.

use crate::domain::{Market, ShortPosition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod merged;
pub mod mock;
pub mod regulator;
pub mod rows;

pub use merged::MergedSource;
pub use mock::MockSource;
pub use regulator::{CsvLayout, CsvRegulatorSource};
pub use rows::{normalize_rows, RawRow};

/// A regulator endpoint producing short positions for one market.
///
/// Implementations handle retry and backoff themselves. A failing source
/// returns an error; the publisher degrades it to zero positions.
#[async_trait]
pub trait SourceFetcher: Send + Sync + fmt::Debug {
    /// Short name used in logs and metadata.
    fn name(&self) -> &str;

    fn market(&self) -> Market;

    async fn fetch_positions(&self) -> Result<SourceBatch, DataSourceError>;
}

/// Positions from one fetch plus every input row that was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBatch {
    pub positions: Vec<ShortPosition>,
    pub skipped: Vec<RowRejection>,
}

/// An input row that could not become a position, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 1-based row number within the source file.
    pub row: usize,
    pub reason: String,
}

impl RowRejection {
    pub fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}

/// Error type for data source operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataSourceError {
    /// Connection failure, DNS, TLS.
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    HttpStatus { status: u16, message: String },
    /// Body could not be decoded into rows.
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Error: {0}")]
    Other(String),
}
