//! Mock source for testing without network calls.

use super::{DataSourceError, RowRejection, SourceBatch, SourceFetcher};
use crate::domain::{Market, ShortPosition};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock source that returns predefined positions or a fixed error.
#[derive(Debug, Clone)]
pub struct MockSource {
    name: String,
    market: Market,
    positions: Vec<ShortPosition>,
    skipped: Vec<RowRejection>,
    error: Option<DataSourceError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    /// Create a mock source with no positions.
    pub fn new(name: impl Into<String>, market: Market) -> Self {
        Self {
            name: name.into(),
            market,
            positions: Vec::new(),
            skipped: Vec::new(),
            error: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_position(mut self, position: ShortPosition) -> Self {
        self.positions.push(position);
        self
    }

    pub fn with_positions(mut self, positions: Vec<ShortPosition>) -> Self {
        self.positions.extend(positions);
        self
    }

    pub fn with_skipped(mut self, rejection: RowRejection) -> Self {
        self.skipped.push(rejection);
        self
    }

    /// Fail every fetch with `error`.
    pub fn with_error(mut self, error: DataSourceError) -> Self {
        self.error = Some(error);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches so far, shared between clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn market(&self) -> Market {
        self.market
    }

    async fn fetch_positions(&self) -> Result<SourceBatch, DataSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(SourceBatch {
            positions: self.positions.clone(),
            skipped: self.skipped.clone(),
        })
    }
}
