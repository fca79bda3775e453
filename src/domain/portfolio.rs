//! Portfolio keys supplied by the external portfolio collaborator.

use serde::{Deserialize, Serialize};

/// Ticker suffixes of the Nordic exchanges tracked for short interest.
pub const NORDIC_SUFFIXES: [&str; 4] = [".ST", ".HE", ".OL", ".CO"];

/// A portfolio instrument as the portfolio knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortfolioTicker {
    /// Name shown to the user, e.g. "Ericsson B".
    pub display_name: String,
    /// Exchange ticker, e.g. "ERIC-B.ST".
    pub ticker_symbol: String,
}

impl PortfolioTicker {
    pub fn new(display_name: impl Into<String>, ticker_symbol: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ticker_symbol: ticker_symbol.into(),
        }
    }

    pub fn is_nordic(&self) -> bool {
        NORDIC_SUFFIXES
            .iter()
            .any(|suffix| self.ticker_symbol.ends_with(suffix))
    }
}
