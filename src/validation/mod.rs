//! Accept/reject decision for a candidate snapshot.
//!
//! Checks run in four groups:
//! 1. structure of the raw JSON (stops here on failure)
//! 2. freshness of the snapshot timestamp
//! 3. sanity of every position value
//! 4. corruption relative to the last accepted baseline, when one is given
//!
//! The validator never touches storage. Persisting is the caller's job and
//! must be gated on [`ValidationResult::is_valid`].

pub mod corruption;
pub mod structure;
pub mod values;

use crate::domain::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

pub const DEFAULT_MAX_AGE_HOURS: u32 = 48;
pub const DEFAULT_MIN_EXPECTED_POSITIONS: usize = 10;

/// Which family of check produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Malformed snapshot; never partially trusted.
    Structural,
    /// Too old, or timestamped in the future.
    Freshness,
    /// Out-of-range or implausible values.
    Value,
    /// Large deltas against the baseline.
    Corruption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Structure,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_stopped_at: Option<ValidationStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_hours: Option<f64>,
    pub total_positions: usize,
    pub positions_checked: usize,
    pub positions_with_issues: usize,
    /// Whether the candidate was compared against a baseline.
    pub baseline_compared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_count_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_count_change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_percentage_changes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disappeared_positions: Option<usize>,
}

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub stats: ValidationStats,
}

impl ValidationResult {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.message.clone()).collect()
    }

    pub fn has_error(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    /// Log the summary line and every issue.
    pub fn log_details(&self) {
        if self.is_valid {
            info!("{}", self);
        } else {
            error!("{}", self);
        }
        for issue in &self.errors {
            error!("  ERROR: {}", issue);
        }
        for issue in &self.warnings {
            warn!("  WARNING: {}", issue);
        }
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid {
            write!(f, "Data validation passed")?;
            if !self.warnings.is_empty() {
                write!(f, " with {} warning(s)", self.warnings.len())?;
            }
            Ok(())
        } else {
            write!(f, "Data validation failed with {} error(s)", self.errors.len())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorConfig {
    pub max_age_hours: u32,
    pub min_expected_positions: usize,
    /// Promote every warning to an error.
    pub strict_mode: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            min_expected_positions: DEFAULT_MIN_EXPECTED_POSITIONS,
            strict_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a raw snapshot document against an optional baseline.
    pub fn validate(
        &self,
        candidate: &serde_json::Value,
        baseline: Option<&Snapshot>,
    ) -> ValidationResult {
        self.validate_at(candidate, baseline, Utc::now())
    }

    /// Validate an already typed snapshot.
    pub fn validate_snapshot(
        &self,
        snapshot: &Snapshot,
        baseline: Option<&Snapshot>,
    ) -> ValidationResult {
        self.validate_snapshot_at(snapshot, baseline, Utc::now())
    }

    pub fn validate_snapshot_at(
        &self,
        snapshot: &Snapshot,
        baseline: Option<&Snapshot>,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        match serde_json::to_value(snapshot) {
            Ok(value) => self.validate_at(&value, baseline, now),
            Err(e) => stopped_at_structure(vec![ValidationIssue::new(
                IssueKind::Structural,
                format!("Snapshot could not be serialized: {}", e),
            )]),
        }
    }

    /// Validate as of `now`.
    pub fn validate_at(
        &self,
        candidate: &serde_json::Value,
        baseline: Option<&Snapshot>,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let structural = structure::check(candidate);
        if !structural.is_empty() {
            return stopped_at_structure(structural);
        }

        let snapshot: Snapshot = match serde_json::from_value(candidate.clone()) {
            Ok(s) => s,
            Err(e) => {
                return stopped_at_structure(vec![ValidationIssue::new(
                    IssueKind::Structural,
                    format!("Snapshot does not match the expected shape: {}", e),
                )])
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut stats = ValidationStats::default();

        let freshness =
            values::check_freshness(snapshot.generated_at, now, self.config.max_age_hours);
        errors.extend(freshness.errors);
        warnings.extend(freshness.warnings);
        stats.data_age_hours = Some(freshness.age_hours);

        let checked = values::check_positions(
            &snapshot.positions,
            now.date_naive(),
            self.config.min_expected_positions,
        );
        errors.extend(checked.errors);
        warnings.extend(checked.warnings);
        stats.total_positions = snapshot.positions.len();
        stats.positions_checked = checked.positions_checked;
        stats.positions_with_issues = checked.positions_with_issues;

        if let Some(baseline) = baseline {
            let report = corruption::check(&snapshot, baseline);
            errors.extend(report.errors);
            warnings.extend(report.warnings);
            stats.baseline_compared = true;
            stats.position_count_change = report.position_count_change;
            stats.position_count_change_percent = report.position_count_change_percent;
            stats.large_percentage_changes = Some(report.large_changes);
            stats.disappeared_positions = Some(report.disappeared);
        }

        if self.config.strict_mode {
            errors.append(&mut warnings);
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            stats,
        }
    }
}

fn stopped_at_structure(errors: Vec<ValidationIssue>) -> ValidationResult {
    ValidationResult {
        is_valid: false,
        errors,
        warnings: Vec::new(),
        stats: ValidationStats {
            validation_stopped_at: Some(ValidationStage::Structure),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Market, PositionHolder, ShortPosition};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn position(company: &str, pct: f64) -> ShortPosition {
        ShortPosition {
            ticker_or_identifier: format!("{}-LEI", company),
            company_name: company.to_string(),
            holder: "Multiple (aggregated)".to_string(),
            percentage: pct,
            disclosure_date: "2026-03-09".to_string(),
            market: Market::Se,
            threshold_crossed: Some("0.1%".to_string()),
            individual_holders: vec![],
        }
    }

    fn snapshot(count: usize, age: Duration) -> Snapshot {
        let positions = (0..count)
            .map(|i| position(&format!("Company {}", i), 1.0 + (i % 8) as f64))
            .collect();
        Snapshot::new(now() - age, "test", positions, BTreeMap::new())
    }

    fn holders(pcts: &[f64]) -> Vec<PositionHolder> {
        pcts.iter()
            .enumerate()
            .map(|(i, pct)| PositionHolder {
                holder_name: format!("Fund {}", i),
                percentage: *pct,
                date: "2026-03-09".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_valid_snapshot_passes() {
        let result = Validator::default().validate_snapshot_at(
            &snapshot(20, Duration::hours(1)),
            None,
            now(),
        );
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.stats.total_positions, 20);
        assert!(!result.stats.baseline_compared);
    }

    #[test]
    fn test_zero_positions_always_rejected() {
        let result = Validator::default().validate_snapshot_at(
            &snapshot(0, Duration::hours(1)),
            None,
            now(),
        );
        assert!(!result.is_valid);
        assert!(result.has_error(IssueKind::Value));

        let baseline = snapshot(0, Duration::hours(30));
        let result = Validator::default().validate_snapshot_at(
            &snapshot(0, Duration::zero()),
            Some(&baseline),
            now(),
        );
        assert!(!result.is_valid);
    }

    #[test]
    fn test_structure_failure_short_circuits() {
        let doc = json!({"last_updated": "2026-03-10T11:00:00Z"});
        let result = Validator::default().validate_at(&doc, None, now());
        assert!(!result.is_valid);
        assert_eq!(
            result.stats.validation_stopped_at,
            Some(ValidationStage::Structure)
        );
        assert!(result.stats.data_age_hours.is_none());
        assert!(result.errors.iter().all(|e| e.kind == IssueKind::Structural));
    }

    #[test]
    fn test_too_old_rejected_and_stale_warned() {
        let v = Validator::default();
        let old = v.validate_snapshot_at(&snapshot(20, Duration::hours(49)), None, now());
        assert!(!old.is_valid);
        assert!(old.has_error(IssueKind::Freshness));

        let age = Duration::minutes(47 * 60 + 54);
        let stale = v.validate_snapshot_at(&snapshot(20, age), None, now());
        assert!(stale.is_valid, "{:?}", stale.errors);
        assert!(stale
            .warnings
            .iter()
            .any(|w| w.kind == IssueKind::Freshness));
    }

    #[test]
    fn test_holder_sum_tolerance() {
        let mut s = snapshot(12, Duration::hours(1));
        s.positions[0] = ShortPosition {
            individual_holders: holders(&[6.0, 6.5]),
            ..position("Ericsson", 12.5)
        };
        let ok = Validator::default().validate_snapshot_at(&s, None, now());
        assert!(ok.warnings.is_empty(), "{:?}", ok.warnings);

        s.positions[0].percentage = 20.0;
        let mismatch = Validator::default().validate_snapshot_at(&s, None, now());
        assert!(mismatch.is_valid);
        assert_eq!(mismatch.warnings.len(), 1);
        assert!(mismatch.warnings[0].message.contains("holder sum"));
    }

    #[test]
    fn test_strict_mode_promotes_warnings() {
        let strict = Validator::new(ValidatorConfig {
            strict_mode: true,
            ..Default::default()
        });
        let result = strict.validate_snapshot_at(&snapshot(5, Duration::hours(1)), None, now());
        assert!(!result.is_valid);
        assert!(result.warnings.is_empty());
        assert!(result.errors[0].message.contains("Only 5 positions"));
    }

    #[test]
    fn test_drop_against_baseline() {
        let v = Validator::default();
        let baseline = snapshot(100, Duration::hours(25));

        let sixty_drop =
            v.validate_snapshot_at(&snapshot(40, Duration::hours(1)), Some(&baseline), now());
        assert!(!sixty_drop.is_valid);
        assert!(sixty_drop
            .error_messages()
            .iter()
            .any(|e| e.starts_with("Suspicious drop in position count")));
        assert_eq!(sixty_drop.stats.position_count_change, Some(-60));

        let twenty_drop =
            v.validate_snapshot_at(&snapshot(80, Duration::hours(1)), Some(&baseline), now());
        assert!(twenty_drop.is_valid, "{:?}", twenty_drop.errors);
        assert!(twenty_drop.stats.baseline_compared);
        assert!(!twenty_drop.warnings.is_empty());
        assert!(twenty_drop
            .warnings
            .iter()
            .all(|w| w.kind == IssueKind::Corruption));
        assert_eq!(twenty_drop.stats.disappeared_positions, Some(8));
    }

    #[test]
    fn test_result_display() {
        let result = Validator::default().validate_snapshot_at(
            &snapshot(5, Duration::hours(1)),
            None,
            now(),
        );
        assert_eq!(result.to_string(), "Data validation passed with 1 warning(s)");
    }
}
