//! Shape of the raw snapshot document.

use super::{IssueKind, ValidationIssue};
use crate::domain::parse_timestamp;
use serde_json::Value;

/// Field name and the JSON type it must carry.
const REQUIRED_POSITION_FIELDS: [(&str, JsonType); 5] = [
    ("ticker", JsonType::String),
    ("company_name", JsonType::String),
    ("position_percentage", JsonType::Number),
    ("position_date", JsonType::String),
    ("market", JsonType::String),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JsonType {
    String,
    Number,
}

impl JsonType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::String => value.is_string(),
            JsonType::Number => value.is_number(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Number => "number",
        }
    }
}

fn issue(message: String) -> ValidationIssue {
    ValidationIssue::new(IssueKind::Structural, message)
}

/// Every structural problem in `doc`. Empty means the document is well formed.
pub fn check(doc: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(obj) = doc.as_object() else {
        issues.push(issue("Snapshot is not a JSON object".to_string()));
        return issues;
    };

    match obj.get("last_updated") {
        None => issues.push(issue("Missing required field: last_updated".to_string())),
        Some(Value::String(raw)) => {
            if parse_timestamp(raw).is_none() {
                issues.push(issue(format!("Invalid timestamp format: {}", raw)));
            }
        }
        Some(_) => issues.push(issue("Field 'last_updated' must be a string".to_string())),
    }

    let positions = match obj.get("positions") {
        None => {
            issues.push(issue("Missing required field: positions".to_string()));
            return issues;
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            issues.push(issue("Field 'positions' must be a list".to_string()));
            return issues;
        }
    };

    for (i, pos) in positions.iter().enumerate() {
        check_position(i, pos, &mut issues);
    }

    issues
}

fn check_position(i: usize, pos: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(obj) = pos.as_object() else {
        issues.push(issue(format!("Position {} is not an object", i)));
        return;
    };

    for (field, ty) in REQUIRED_POSITION_FIELDS {
        match obj.get(field) {
            None => issues.push(issue(format!("Position {}: missing field '{}'", i, field))),
            Some(v) if !ty.matches(v) => issues.push(issue(format!(
                "Position {}: field '{}' must be a {}",
                i,
                field,
                ty.name()
            ))),
            Some(_) => {}
        }
    }

    if let Some(v) = obj.get("position_holder") {
        if !v.is_string() {
            issues.push(issue(format!(
                "Position {}: field 'position_holder' must be a string",
                i
            )));
        }
    }

    if let Some(v) = obj.get("threshold_crossed") {
        if !(v.is_string() || v.is_null()) {
            issues.push(issue(format!(
                "Position {}: field 'threshold_crossed' must be a string or null",
                i
            )));
        }
    }

    match obj.get("individual_holders") {
        None | Some(Value::Null) => {}
        Some(Value::Array(holders)) => {
            for (j, holder) in holders.iter().enumerate() {
                let well_formed = holder
                    .as_object()
                    .map(|h| {
                        h.get("holder_name").is_some_and(Value::is_string)
                            && h.get("position_percentage").is_some_and(Value::is_number)
                    })
                    .unwrap_or(false);
                if !well_formed {
                    issues.push(issue(format!(
                        "Position {}: holder {} needs a string 'holder_name' and a numeric 'position_percentage'",
                        i, j
                    )));
                }
            }
        }
        Some(_) => issues.push(issue(format!(
            "Position {}: field 'individual_holders' must be a list",
            i
        ))),
    }
}
