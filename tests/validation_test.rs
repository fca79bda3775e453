mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{position, positions, with_holders};
use nordshort::domain::Snapshot;
use nordshort::validation::IssueKind;
use nordshort::{Validator, ValidatorConfig};
use std::collections::BTreeMap;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap()
}

fn snapshot(count: usize) -> Snapshot {
    Snapshot::new(now() - Duration::hours(2), "test", positions(count, now()), BTreeMap::new())
}

#[test]
fn test_holder_sum_tolerance() {
    let mut batch = positions(12, now());
    batch.push(with_holders(
        position("Within Tolerance AB", 12.5, now()),
        &[("Fund A", 6.0), ("Fund B", 6.5)],
    ));
    batch.push(with_holders(
        position("Mismatch AB", 20.0, now()),
        &[("Fund A", 6.0), ("Fund B", 6.5)],
    ));
    let s = Snapshot::new(now(), "test", batch, BTreeMap::new());

    let result = Validator::default().validate_snapshot_at(&s, None, now());
    assert!(result.is_valid);
    let mismatches: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.message.contains("holder sum"))
        .collect();
    assert_eq!(mismatches.len(), 1);
    assert!(mismatches[0].message.contains("MismatchAB"));
}

#[test]
fn test_moderate_drop_is_accepted_with_warnings() {
    let baseline = snapshot(100);
    let result = Validator::default().validate_snapshot_at(&snapshot(80), Some(&baseline), now());

    assert!(result.is_valid, "{}", result);
    assert!(result.warnings.iter().any(|w| w.kind == IssueKind::Corruption));
    assert_eq!(result.stats.position_count_change, Some(-20));
}

#[test]
fn test_large_drop_is_rejected() {
    let baseline = snapshot(100);
    let result = Validator::default().validate_snapshot_at(&snapshot(40), Some(&baseline), now());

    assert!(!result.is_valid);
    assert!(result.errors.iter().all(|e| e.kind == IssueKind::Corruption));
}

#[test]
fn test_stale_snapshot_is_rejected_before_values() {
    let old = Snapshot::new(
        now() - Duration::hours(49),
        "test",
        positions(20, now()),
        BTreeMap::new(),
    );
    let result = Validator::default().validate_snapshot_at(&old, None, now());
    assert!(!result.is_valid);
    assert_eq!(result.errors[0].kind, IssueKind::Freshness);
}

#[test]
fn test_strict_mode_promotes_low_count_warning() {
    let strict = Validator::new(ValidatorConfig {
        strict_mode: true,
        ..ValidatorConfig::default()
    });
    let lenient = Validator::default();

    assert!(lenient.validate_snapshot_at(&snapshot(5), None, now()).is_valid);
    assert!(!strict.validate_snapshot_at(&snapshot(5), None, now()).is_valid);
}

#[test]
fn test_malformed_document_reports_structure_only() {
    let doc = serde_json::json!({
        "last_updated": "yesterday",
        "positions": [{"company_name": "No Ticker AB"}],
    });
    let result = Validator::default().validate_at(&doc, None, now());
    assert!(!result.is_valid);
    assert!(result.errors.iter().all(|e| e.kind == IssueKind::Structural));
    assert!(result.stats.validation_stopped_at.is_some());
}
