// Stable, type-aware ordering of the record view

use crate::record::{FieldValue, Record};
use crate::schema::{FieldKind, Schema};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Active sort: one field plus a direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Header-click semantics: re-selecting the active field flips its
/// direction, a new field starts at its declared default.
pub fn toggle(current: Option<&SortKey>, field: &str, schema: &Schema) -> SortKey {
    if let Some(key) = current {
        if key.field == field {
            return SortKey::new(field, key.direction.flip());
        }
    }
    let direction = schema
        .field(field)
        .map(|f| f.default_direction)
        .unwrap_or(Direction::Asc);
    SortKey::new(field, direction)
}

/// Sort a view by one typed field.
///
/// Ties (and records missing the field entirely) keep their original
/// relative order: the comparator decorates each record with its input
/// position and breaks ties on it explicitly. Records without the field
/// sort after records that have it, in either direction.
pub fn sort(records: &[Record], schema: &Schema, key: &SortKey) -> Vec<Record> {
    let kind = schema.kind_of(&key.field).unwrap_or(FieldKind::Text);

    let mut decorated: Vec<(usize, &Record)> = records.iter().enumerate().collect();
    decorated.sort_by(|(ai, a), (bi, b)| {
        let av = a.field(&key.field);
        let bv = b.field(&key.field);
        let ordering = match (&av, &bv) {
            (Some(a), Some(b)) => {
                let by_value = compare_values(kind, a, b);
                match key.direction {
                    Direction::Asc => by_value,
                    Direction::Desc => by_value.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ordering.then(ai.cmp(bi))
    });

    decorated.into_iter().map(|(_, r)| r.clone()).collect()
}

fn compare_values(kind: FieldKind, a: &FieldValue, b: &FieldValue) -> Ordering {
    match kind {
        FieldKind::Number => {
            let a = a.as_num().unwrap_or(f64::NEG_INFINITY);
            let b = b.as_num().unwrap_or(f64::NEG_INFINITY);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        FieldKind::Timestamp => {
            let a = a.as_date_ms().unwrap_or(i64::MIN);
            let b = b.as_date_ms().unwrap_or(i64::MIN);
            a.cmp(&b)
        }
        FieldKind::Text | FieldKind::Tag => {
            let a = a.to_string().to_lowercase();
            let b = b.to_string().to_lowercase();
            a.cmp(&b)
        }
    }
}
