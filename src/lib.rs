pub mod api;
pub mod client;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod portfolio;
pub mod store;
pub mod validation;

pub use client::{CachedFetcher, FetchedData, FileTransport, HttpTransport, Transport};
pub use config::{Config, TransportConfig};
pub use datasource::{DataSourceError, MergedSource, MockSource, SourceBatch, SourceFetcher};
pub use domain::{
    Market, MatchQuality, MatchResult, PortfolioTicker, PositionHolder, ShortPosition, Snapshot,
};
pub use error::AppError;
pub use orchestration::{PublishMetadata, PublishOutcome, PublishStatus, Publisher};
pub use portfolio::{JsonPortfolio, PortfolioProvider, StaticPortfolio};
pub use store::{HistoryBook, SnapshotStore};
pub use validation::{ValidationResult, Validator, ValidatorConfig};
