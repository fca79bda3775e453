//! Matching regulator disclosures against portfolio tickers by company name.
//!
//! Both sides are expanded into name variants. Every variant hit is scored
//! and each ticker keeps its single best candidate.

use crate::domain::{MatchQuality, MatchResult, PortfolioTicker, ShortPosition};
use crate::engine::normalize::{normalize, share_class_base, variants, words, HOLDING_PREFIXES};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

pub const EXACT_SCORE: i32 = 100;
pub const NORMALIZED_SCORE: i32 = 90;
pub const LONG_VARIATION_SCORE: i32 = 85;
pub const VARIATION_SCORE: i32 = 80;
/// A matched variant longer than this counts as a long variation.
pub const LONG_VARIATION_MIN_LEN: usize = 10;

/// "Aktiebolaget X" where X is the portfolio name.
pub const PARENT_PATTERN_BONUS: i32 = 15;
/// Disclosure name carries a subsidiary/division word.
pub const SUBSIDIARY_PENALTY: i32 = 10;
pub const SINGLE_WORD_BONUS: i32 = 5;
pub const TWO_WORD_BONUS: i32 = 3;
/// Disclosure name starts or ends with the matched variant.
pub const AFFIX_BONUS: i32 = 2;

/// Words that mark a division or subsidiary filing separately from the parent.
pub const SUBSIDIARY_WORDS: [&str; 6] = [
    "professional",
    "group",
    "holding",
    "international",
    "systems",
    "networks",
];

/// Quality tier plus tie-break score of one candidate pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateScore {
    pub quality: MatchQuality,
    pub score: i32,
}

impl CandidateScore {
    /// Whether this candidate should replace `current` as a ticker's match.
    ///
    /// An exact name match always wins over a non-exact one; otherwise the
    /// higher score wins and ties keep `current`.
    pub fn outranks(&self, current: &CandidateScore) -> bool {
        let key = |c: &CandidateScore| (c.quality == MatchQuality::Exact, c.score);
        key(self) > key(current)
    }
}

/// Score a disclosure against one portfolio display name.
///
/// `company_norm` is the normalized disclosure name and `variant` the
/// disclosure variant that hit the index.
pub fn score_candidate(company_norm: &str, variant: &str, display_name: &str) -> CandidateScore {
    let portfolio_norm = normalize(display_name);

    let (quality, mut score) = if portfolio_norm == company_norm {
        (MatchQuality::Exact, EXACT_SCORE)
    } else if variant == company_norm {
        (MatchQuality::Normalized, NORMALIZED_SCORE)
    } else if variant.chars().count() > LONG_VARIATION_MIN_LEN {
        (MatchQuality::LongVariation, LONG_VARIATION_SCORE)
    } else {
        (MatchQuality::Variation, VARIATION_SCORE)
    };

    let company_words = words(company_norm);

    if company_words.len() == 2
        && HOLDING_PREFIXES.contains(&company_words[0])
        && company_words[1] == share_class_base(&portfolio_norm)
    {
        score += PARENT_PATTERN_BONUS;
    }

    if company_words.iter().any(|w| SUBSIDIARY_WORDS.contains(w)) {
        score -= SUBSIDIARY_PENALTY;
    }

    match company_words.len() {
        1 => score += SINGLE_WORD_BONUS,
        2 => score += TWO_WORD_BONUS,
        _ => {}
    }

    if company_norm.starts_with(variant) || company_norm.ends_with(variant) {
        score += AFFIX_BONUS;
    }

    CandidateScore { quality, score }
}

/// Inverted index from name variant to the portfolio tickers producing it.
#[derive(Debug)]
pub struct PortfolioIndex<'a> {
    by_variant: HashMap<String, Vec<&'a PortfolioTicker>>,
}

impl<'a> PortfolioIndex<'a> {
    pub fn new(portfolio: &'a [PortfolioTicker]) -> Self {
        let mut by_variant: HashMap<String, Vec<&PortfolioTicker>> = HashMap::new();
        for ticker in portfolio {
            for variant in variants(&ticker.display_name) {
                by_variant.entry(variant).or_default().push(ticker);
            }
        }
        Self { by_variant }
    }

    pub fn lookup(&self, variant: &str) -> &[&'a PortfolioTicker] {
        self.by_variant
            .get(variant)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_variant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_variant.is_empty()
    }
}

/// Resolve at most one disclosure per portfolio ticker.
///
/// Tickers without any variant hit are absent from the result.
pub fn match_positions(
    positions: &[ShortPosition],
    portfolio: &[PortfolioTicker],
) -> BTreeMap<String, MatchResult> {
    let index = PortfolioIndex::new(portfolio);
    let mut best: HashMap<&str, (CandidateScore, &ShortPosition)> = HashMap::new();

    for pos in positions {
        let company_norm = normalize(&pos.company_name);
        for variant in variants(&pos.company_name) {
            for ticker in index.lookup(&variant) {
                let candidate = score_candidate(&company_norm, &variant, &ticker.display_name);
                let replace = match best.get(ticker.ticker_symbol.as_str()) {
                    Some((current, _)) => candidate.outranks(current),
                    None => true,
                };
                if replace {
                    debug!(
                        "{} -> {:?} ({}, score {})",
                        ticker.ticker_symbol, pos.company_name, candidate.quality, candidate.score
                    );
                    best.insert(ticker.ticker_symbol.as_str(), (candidate, pos));
                }
            }
        }
    }

    let matches: BTreeMap<String, MatchResult> = best
        .into_iter()
        .map(|(ticker, (candidate, pos))| {
            (
                ticker.to_string(),
                MatchResult {
                    company_name: pos.company_name.clone(),
                    percentage: pos.percentage,
                    disclosure_date: pos.disclosure_date.clone(),
                    holder: pos.holder.clone(),
                    market: pos.market,
                    match_quality: candidate.quality,
                    match_score: candidate.score,
                },
            )
        })
        .collect();

    let count = |q: MatchQuality| matches.values().filter(|m| m.match_quality == q).count();
    info!(
        "Matched {}/{} portfolio tickers: {} exact, {} normalized, {} long_variation, {} variation",
        matches.len(),
        portfolio.len(),
        count(MatchQuality::Exact),
        count(MatchQuality::Normalized),
        count(MatchQuality::LongVariation),
        count(MatchQuality::Variation),
    );

    matches
}
