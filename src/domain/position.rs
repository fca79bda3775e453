//! Regulator disclosures: ShortPosition, PositionHolder, Market.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date formats seen in regulator exports, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%Y-%m-%d %H:%M:%S"];

/// Parse a disclosure date in any of the formats regulators publish.
pub fn parse_disclosure_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Market whose regulator published the disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Sweden (Finansinspektionen).
    #[serde(rename = "SE")]
    Se,
    /// Finland (Finanssivalvonta).
    #[serde(rename = "FI")]
    Fi,
    /// Norway (Finanstilsynet).
    #[serde(rename = "NO")]
    No,
    /// Denmark (Finanstilsynet).
    #[serde(rename = "DK")]
    Dk,
    /// Any market code this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Market {
    pub fn code(&self) -> &'static str {
        match self {
            Market::Se => "SE",
            Market::Fi => "FI",
            Market::No => "NO",
            Market::Dk => "DK",
            Market::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One holder's part of an aggregated disclosure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionHolder {
    pub holder_name: String,
    #[serde(rename = "position_percentage")]
    pub percentage: f64,
    #[serde(rename = "position_date", default)]
    pub date: String,
}

/// One regulator disclosure, normalized at the fetcher boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortPosition {
    /// Ticker, ISIN or LEI, whichever the regulator publishes.
    #[serde(rename = "ticker")]
    pub ticker_or_identifier: String,
    pub company_name: String,
    /// Holder name, or a summary such as "Multiple (aggregated)".
    #[serde(rename = "position_holder", default)]
    pub holder: String,
    /// Share of outstanding shares, 0-100.
    #[serde(rename = "position_percentage")]
    pub percentage: f64,
    #[serde(rename = "position_date")]
    pub disclosure_date: String,
    pub market: Market,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_crossed: Option<String>,
    /// Per-holder breakdown, largest first. Empty when the regulator only
    /// publishes totals.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub individual_holders: Vec<PositionHolder>,
}

impl ShortPosition {
    pub fn has_holders(&self) -> bool {
        !self.individual_holders.is_empty()
    }

    /// Holder with the largest position; the first one wins ties.
    pub fn top_holder(&self) -> Option<&PositionHolder> {
        self.individual_holders.iter().fold(None, |best, h| match best {
            Some(b) if b.percentage >= h.percentage => Some(b),
            _ => Some(h),
        })
    }

    pub fn holder_sum(&self) -> f64 {
        self.individual_holders.iter().map(|h| h.percentage).sum()
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_disclosure_date(&self.disclosure_date)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<PositionHolder>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<PositionHolder>>::deserialize(deserializer)?.unwrap_or_default())
}
