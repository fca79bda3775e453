//! Domain types for Nordic short-interest tracking.
//!
//! This module provides:
//! - Regulator disclosures: `ShortPosition`, `PositionHolder`, `Market`
//! - Portfolio keys: `PortfolioTicker`
//! - Matching and snapshot types: `MatchResult`, `MatchQuality`, `Snapshot`
//!
//! Serde field names follow the published JSON files, so these types are
//! also the wire format.

pub mod position;
pub mod portfolio;
pub mod snapshot;

pub use portfolio::PortfolioTicker;
pub use position::{parse_disclosure_date, Market, PositionHolder, ShortPosition};
pub use snapshot::{parse_timestamp, MatchQuality, MatchResult, Snapshot};
