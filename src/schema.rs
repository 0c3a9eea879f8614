// Per-view field declarations driving filter, sort, and export

use crate::sort::Direction;
use serde::{Deserialize, Serialize};

/// Semantic type of a field, dispatching comparison and formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
    Tag,
}

/// Declaration of one browsable column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Required fields are always present in exports
    pub required: bool,
    /// Direction used when this field is first selected for sorting.
    /// Timestamp fields default to newest-first.
    pub default_direction: Direction,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let default_direction = match kind {
            FieldKind::Timestamp => Direction::Desc,
            _ => Direction::Asc,
        };
        Self {
            name: name.into(),
            kind,
            required: false,
            default_direction,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn descending(mut self) -> Self {
        self.default_direction = Direction::Desc;
        self
    }
}

/// Ordered set of field declarations for one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|f| f.kind)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSpec::new("id", FieldKind::Text).required(),
            FieldSpec::new("caller", FieldKind::Text),
            FieldSpec::new("started_at", FieldKind::Timestamp),
            FieldSpec::new("cost", FieldKind::Number),
        ])
    }

    #[test]
    fn test_field_lookup() {
        let schema = schema();
        assert_eq!(schema.kind_of("cost"), Some(FieldKind::Number));
        assert_eq!(schema.kind_of("nope"), None);
        assert!(schema.field("id").unwrap().required);
    }

    #[test]
    fn test_timestamp_defaults_descending() {
        let schema = schema();
        assert_eq!(
            schema.field("started_at").unwrap().default_direction,
            Direction::Desc
        );
        assert_eq!(schema.field("caller").unwrap().default_direction, Direction::Asc);
    }

    #[test]
    fn test_required_fields_iterates_in_declaration_order() {
        let schema = Schema::new(vec![
            FieldSpec::new("a", FieldKind::Text).required(),
            FieldSpec::new("b", FieldKind::Text),
            FieldSpec::new("c", FieldKind::Text).required(),
        ]);
        let required: Vec<&str> = schema.required_fields().collect();
        assert_eq!(required, vec!["a", "c"]);
    }
}
