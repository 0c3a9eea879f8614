// Compound predicate evaluation over the record view

use crate::record::{FieldValue, Record};
use crate::schema::{FieldKind, Schema};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One per-field constraint, AND-combined across the spec.
///
/// Values are operator-entered strings interpreted against the field's
/// declared kind. An empty string means "no restriction", same as leaving
/// the field out of the spec entirely. A value that fails to parse for
/// its kind also degrades to "no restriction".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Constraint {
    Equals { value: String },
    Substring { needle: String },
    Range { min: Option<String>, max: Option<String> },
}

impl Constraint {
    pub fn equals(value: impl Into<String>) -> Self {
        Constraint::Equals { value: value.into() }
    }

    pub fn substring(needle: impl Into<String>) -> Self {
        Constraint::Substring { needle: needle.into() }
    }

    pub fn range(min: Option<String>, max: Option<String>) -> Self {
        Constraint::Range { min, max }
    }

    /// True when this constraint cannot reject any record
    pub fn is_vacuous(&self) -> bool {
        match self {
            Constraint::Equals { value } => value.trim().is_empty(),
            Constraint::Substring { needle } => needle.trim().is_empty(),
            Constraint::Range { min, max } => bound_is_open(min) && bound_is_open(max),
        }
    }

    fn admits(&self, kind: FieldKind, value: Option<&FieldValue>) -> bool {
        if self.is_vacuous() {
            return true;
        }
        // A real constraint over a field the record lacks rejects it
        let Some(value) = value else {
            return false;
        };
        match self {
            Constraint::Equals { value: wanted } => match kind {
                FieldKind::Text | FieldKind::Tag => {
                    value.to_string().to_lowercase() == wanted.trim().to_lowercase()
                }
                FieldKind::Number => match parse_num(wanted) {
                    Some(wanted) => value.as_num() == Some(wanted),
                    None => true,
                },
                FieldKind::Timestamp => match parse_date_target(wanted) {
                    Some(target) => value
                        .as_date_ms()
                        .map(|ms| target.contains(ms))
                        .unwrap_or(false),
                    None => true,
                },
            },
            Constraint::Substring { needle } => value
                .to_string()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Constraint::Range { min, max } => in_range(kind, value, min.as_deref(), max.as_deref()),
        }
    }
}

fn bound_is_open(bound: &Option<String>) -> bool {
    match bound {
        None => true,
        Some(s) => s.trim().is_empty(),
    }
}

/// AND-combined set of per-field constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    constraints: BTreeMap<String, Constraint>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, constraint: Constraint) {
        self.constraints.insert(field.into(), constraint);
    }

    pub fn unset(&mut self, field: &str) {
        self.constraints.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&Constraint> {
        self.constraints.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Constraint)> {
        self.constraints.iter()
    }

    /// Preset-load semantics: fields present in `other` overwrite, fields
    /// it never mentions stay as they are.
    pub fn merge_from(&mut self, other: &FilterSpec) {
        for (field, constraint) in &other.constraints {
            self.constraints.insert(field.clone(), constraint.clone());
        }
    }
}

/// Evaluate a spec over a record sequence. Pure, order-preserving, and
/// total: constraints that cannot be interpreted admit everything.
pub fn filter(records: &[Record], schema: &Schema, spec: &FilterSpec) -> Vec<Record> {
    records
        .iter()
        .filter(|record| {
            spec.iter().all(|(field, constraint)| {
                let kind = schema.kind_of(field).unwrap_or(FieldKind::Text);
                constraint.admits(kind, record.field(field).as_ref())
            })
        })
        .cloned()
        .collect()
}

fn parse_num(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Inclusive millisecond window named by a date input. Day-granularity
/// inputs cover the whole day; RFC 3339 and raw epoch-ms inputs are exact.
struct DateTarget {
    start: i64,
    end: i64,
}

impl DateTarget {
    fn contains(&self, ms: i64) -> bool {
        ms >= self.start && ms <= self.end
    }
}

fn parse_date_target(s: &str) -> Option<DateTarget> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return Some(DateTarget { start: ms, end: ms });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        let ms = dt.timestamp_millis();
        return Some(DateTarget { start: ms, end: ms });
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let start = day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
        return Some(DateTarget {
            start,
            end: start + 86_399_999,
        });
    }
    None
}

fn in_range(kind: FieldKind, value: &FieldValue, min: Option<&str>, max: Option<&str>) -> bool {
    match kind {
        FieldKind::Number => {
            let Some(v) = value.as_num() else {
                return false;
            };
            // A bound that fails to parse is treated as open
            if let Some(min) = min.and_then(parse_num) {
                if v < min {
                    return false;
                }
            }
            if let Some(max) = max.and_then(parse_num) {
                if v > max {
                    return false;
                }
            }
            true
        }
        FieldKind::Timestamp => {
            let Some(v) = value.as_date_ms() else {
                return false;
            };
            if let Some(target) = min.and_then(parse_date_target) {
                if v < target.start {
                    return false;
                }
            }
            if let Some(target) = max.and_then(parse_date_target) {
                if v > target.end {
                    return false;
                }
            }
            true
        }
        FieldKind::Text | FieldKind::Tag => {
            let v = value.to_string().to_lowercase();
            if let Some(min) = min.filter(|s| !s.trim().is_empty()) {
                if v < min.to_lowercase() {
                    return false;
                }
            }
            if let Some(max) = max.filter(|s| !s.trim().is_empty()) {
                if v > max.to_lowercase() {
                    return false;
                }
            }
            true
        }
    }
}
