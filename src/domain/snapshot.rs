//! Snapshot: the unit of validation and persistence.

use crate::domain::{Market, ShortPosition};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Parse a snapshot timestamp: RFC 3339, or a naive ISO-8601 time taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// How a portfolio ticker was tied to a disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchQuality {
    /// Normalized disclosure name equals the normalized display name.
    Exact,
    /// A display-name variant equals the normalized disclosure name.
    Normalized,
    /// A variant longer than 10 characters matched.
    LongVariation,
    /// Any other variant matched.
    Variation,
}

impl MatchQuality {
    /// Higher is better.
    pub fn rank(&self) -> u8 {
        match self {
            MatchQuality::Exact => 3,
            MatchQuality::Normalized => 2,
            MatchQuality::LongVariation => 1,
            MatchQuality::Variation => 0,
        }
    }
}

impl std::fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchQuality::Exact => "exact",
            MatchQuality::Normalized => "normalized",
            MatchQuality::LongVariation => "long_variation",
            MatchQuality::Variation => "variation",
        };
        f.write_str(s)
    }
}

/// Best disclosure found for one portfolio ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub company_name: String,
    #[serde(rename = "short_percentage")]
    pub percentage: f64,
    #[serde(rename = "position_date")]
    pub disclosure_date: String,
    #[serde(rename = "position_holder")]
    pub holder: String,
    pub market: Market,
    pub match_quality: MatchQuality,
    /// Only meaningful for ordering candidates.
    pub match_score: i32,
}

/// All positions from one publisher run plus the portfolio matches.
///
/// Serialized as `short_positions_current.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "last_updated", deserialize_with = "deserialize_timestamp")]
    pub generated_at: DateTime<Utc>,
    #[serde(default = "default_update_source")]
    pub update_source: String,
    pub positions: Vec<ShortPosition>,
    #[serde(rename = "portfolio_matches", default)]
    pub matches: BTreeMap<String, MatchResult>,
}

fn default_update_source() -> String {
    "unknown".to_string()
}

impl Snapshot {
    pub fn new(
        generated_at: DateTime<Utc>,
        update_source: impl Into<String>,
        positions: Vec<ShortPosition>,
        matches: BTreeMap<String, MatchResult>,
    ) -> Self {
        Self {
            generated_at,
            update_source: update_source.into(),
            positions,
            matches,
        }
    }

    pub fn positions_with_holders(&self) -> usize {
        self.positions.iter().filter(|p| p.has_holders()).count()
    }

    /// Position count per market, ordered by market.
    pub fn per_market(&self) -> BTreeMap<Market, usize> {
        let mut counts = BTreeMap::new();
        for pos in &self.positions {
            *counts.entry(pos.market).or_insert(0) += 1;
        }
        counts
    }

    /// SHA-256 over the canonical JSON of the positions.
    ///
    /// Two snapshots with the same fingerprint carry the same disclosures,
    /// regardless of when they were generated.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        for pos in &self.positions {
            // Serializing a plain struct of strings and numbers cannot fail.
            if let Ok(bytes) = serde_json::to_vec(pos) {
                hasher.update(&bytes);
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}
