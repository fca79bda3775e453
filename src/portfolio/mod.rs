//! Portfolio tickers to match disclosures against.

use crate::domain::PortfolioTicker;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("Failed to read portfolio file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Portfolio file {path} is not a JSON object of name to ticker: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Supplies the Nordic tickers a publisher run matches against.
#[async_trait]
pub trait PortfolioProvider: Send + Sync + fmt::Debug {
    async fn tickers(&self) -> Result<Vec<PortfolioTicker>, PortfolioError>;
}

/// A `{display_name: ticker}` JSON file; only Nordic tickers are kept.
#[derive(Debug, Clone)]
pub struct JsonPortfolio {
    path: PathBuf,
}

impl JsonPortfolio {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse a portfolio document, keeping Nordic tickers in name order.
    pub fn parse(raw: &str) -> Result<Vec<PortfolioTicker>, serde_json::Error> {
        let entries: BTreeMap<String, String> = serde_json::from_str(raw)?;
        Ok(entries
            .into_iter()
            .map(|(name, ticker)| PortfolioTicker::new(name, ticker))
            .filter(PortfolioTicker::is_nordic)
            .collect())
    }
}

#[async_trait]
impl PortfolioProvider for JsonPortfolio {
    async fn tickers(&self) -> Result<Vec<PortfolioTicker>, PortfolioError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Portfolio file not found at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PortfolioError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let tickers = Self::parse(&raw).map_err(|source| PortfolioError::Json {
            path: self.path.clone(),
            source,
        })?;
        info!("Loaded {} Nordic tickers from {}", tickers.len(), self.path.display());
        Ok(tickers)
    }
}

/// A fixed ticker list.
#[derive(Debug, Clone, Default)]
pub struct StaticPortfolio(pub Vec<PortfolioTicker>);

#[async_trait]
impl PortfolioProvider for StaticPortfolio {
    async fn tickers(&self) -> Result<Vec<PortfolioTicker>, PortfolioError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_keeps_nordic_tickers() {
        let raw = r#"{"Ericsson B": "ERIC-B.ST", "Apple": "AAPL", "Nokia": "NOKIA.HE"}"#;
        let tickers = JsonPortfolio::parse(raw).unwrap();
        assert_eq!(
            tickers,
            vec![
                PortfolioTicker::new("Ericsson B", "ERIC-B.ST"),
                PortfolioTicker::new("Nokia", "NOKIA.HE"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_portfolio() {
        let dir = TempDir::new().unwrap();
        let portfolio = JsonPortfolio::new(dir.path().join("stockPortfolio.json"));
        assert!(portfolio.tickers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stockPortfolio.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let err = JsonPortfolio::new(&path).tickers().await.unwrap_err();
        assert!(matches!(err, PortfolioError::Json { .. }));
    }
}
