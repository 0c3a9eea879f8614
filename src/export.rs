// Serializes a (columns x rows) view into a transportable payload

use crate::record::{FieldValue, Record};
use crate::schema::Schema;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Which rows to export. `Selection` falls back to the entire view when
/// nothing is selected; `All` always takes the entire view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportScope {
    Selection,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Requested column order. Empty means every schema column.
    pub columns: Vec<String>,
    pub scope: ExportScope,
}

/// Final column list: the caller's order, unknown fields dropped,
/// duplicates collapsed, and required fields re-added at the end if the
/// caller left them out. Removing a required column is a silent no-op by
/// contract, not an error.
pub fn resolve_columns(schema: &Schema, requested: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    if requested.is_empty() {
        columns.extend(schema.fields().iter().map(|f| f.name.clone()));
        return columns;
    }
    for name in requested {
        if schema.field(name).is_some() && !columns.iter().any(|c| c == name) {
            columns.push(name.clone());
        }
    }
    for name in schema.required_fields() {
        if !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// Build the export payload for an already-scoped row set
pub fn build(rows: &[Record], schema: &Schema, requested: &[String], format: ExportFormat) -> String {
    let columns = resolve_columns(schema, requested);
    match format {
        ExportFormat::Csv => build_csv(rows, &columns),
        ExportFormat::Json => build_json(rows, &columns),
    }
}

fn build_csv(rows: &[Record], columns: &[String]) -> String {
    let mut out = String::new();
    out.push_str(
        &columns
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');
    for row in rows {
        let line = columns
            .iter()
            .map(|column| {
                row.field(column)
                    .map(|v| csv_escape(&display_value(&v)))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn build_json(rows: &[Record], columns: &[String]) -> String {
    let objects: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for column in columns {
                let value = row.field(column).map(json_value).unwrap_or(Value::Null);
                object.insert(column.clone(), value);
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(objects).to_string()
}

/// Human-facing rendering of one value, shared by CSV export and the CLI
/// table
pub fn display_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Str(s) | FieldValue::Tag(s) => s.clone(),
        FieldValue::Num(n) => format_num(*n),
        FieldValue::Date(ms) => match Utc.timestamp_millis_opt(*ms).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => ms.to_string(),
        },
    }
}

fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn json_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Str(s) | FieldValue::Tag(s) => Value::String(s),
        FieldValue::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 9e15 {
                Value::from(n as i64)
            } else {
                Value::from(n)
            }
        }
        FieldValue::Date(ms) => match Utc.timestamp_millis_opt(ms).single() {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => Value::from(ms),
        },
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
