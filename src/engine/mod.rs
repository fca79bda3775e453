//! Pure computation: name normalization, portfolio matching, trend derivation.

pub mod matcher;
pub mod normalize;
pub mod trend;

pub use matcher::{match_positions, score_candidate, CandidateScore, PortfolioIndex};
pub use normalize::{normalize, share_class_base, variants};
pub use trend::{compute_trend, ShortTrend, TrendReport};
