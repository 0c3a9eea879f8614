// Typed record model for the live browser

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single browsable record: one call, CDR row, or invoice line.
///
/// Attributes are an open field map so the same browser core serves the
/// call-management, CDR, and billing views. `id` is unique and stable; a
/// record is never edited in place except via an atomic replace-by-id in
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub attributes: BTreeMap<String, FieldValue>,
    pub status: CallStatus,
}

impl Record {
    pub fn new(id: impl Into<String>, status: CallStatus) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
            status,
        }
    }

    /// Builder-style attribute setter, used by sample data and tests
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.attributes.insert(field.into(), value);
        self
    }

    /// Look up a field value. `id` and `status` are addressable like any
    /// attribute so filter/sort/export treat them uniformly.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Str(self.id.clone())),
            "status" => Some(FieldValue::Tag(self.status.as_str().to_string())),
            _ => self.attributes.get(name).cloned(),
        }
    }
}

/// Value types a record attribute can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Str(String),
    Num(f64),
    /// Milliseconds since the Unix epoch
    Date(i64),
    Tag(String),
}

impl FieldValue {
    pub fn str(s: impl Into<String>) -> Self {
        FieldValue::Str(s.into())
    }

    pub fn tag(s: impl Into<String>) -> Self {
        FieldValue::Tag(s.into())
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            FieldValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date_ms(&self) -> Option<i64> {
        match self {
            FieldValue::Date(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) | FieldValue::Tag(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Str(s) | FieldValue::Tag(s) => write!(f, "{}", s),
            FieldValue::Num(n) => write!(f, "{}", n),
            FieldValue::Date(ms) => write!(f, "{}", ms),
        }
    }
}

/// Call lifecycle states
///
/// `Terminated` is terminal; `Hold <-> Active` is the only bidirectional
/// pair, every other edge runs one-way toward `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ringing,
    Active,
    Hold,
    Transferring,
    Terminated,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Ringing => "ringing",
            CallStatus::Active => "active",
            CallStatus::Hold => "hold",
            CallStatus::Transferring => "transferring",
            CallStatus::Terminated => "terminated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ringing" => Some(CallStatus::Ringing),
            "active" => Some(CallStatus::Active),
            "hold" => Some(CallStatus::Hold),
            "transferring" => Some(CallStatus::Transferring),
            "terminated" => Some(CallStatus::Terminated),
            _ => None,
        }
    }

    /// Valid transitions from this status
    pub fn valid_transitions(&self) -> &'static [CallStatus] {
        match self {
            CallStatus::Ringing => &[CallStatus::Active, CallStatus::Terminated],
            CallStatus::Active => &[
                CallStatus::Hold,
                CallStatus::Transferring,
                CallStatus::Terminated,
            ],
            CallStatus::Hold => &[CallStatus::Active, CallStatus::Terminated],
            CallStatus::Transferring => &[CallStatus::Active, CallStatus::Terminated],
            CallStatus::Terminated => &[],
        }
    }

    pub fn can_transition_to(&self, target: CallStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

/// A partial record update, merge-applied as an atomic replace-by-id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub attributes: BTreeMap<String, FieldValue>,
    pub status: Option<CallStatus>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.attributes.insert(field.into(), value);
        self
    }

    pub fn status(mut self, status: CallStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Build the replacement record. The original is untouched; the store
    /// swaps the result in by id.
    pub fn apply_to(&self, record: &Record) -> Record {
        let mut next = record.clone();
        for (field, value) in &self.attributes {
            next.attributes.insert(field.clone(), value.clone());
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup_includes_virtual_fields() {
        let record = Record::new("call-1", CallStatus::Active)
            .with("duration", FieldValue::Num(10.0));

        assert_eq!(record.field("id"), Some(FieldValue::str("call-1")));
        assert_eq!(record.field("status"), Some(FieldValue::tag("active")));
        assert_eq!(record.field("duration"), Some(FieldValue::Num(10.0)));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_status_state_machine() {
        assert!(CallStatus::Ringing.can_transition_to(CallStatus::Active));
        assert!(CallStatus::Active.can_transition_to(CallStatus::Hold));
        assert!(CallStatus::Hold.can_transition_to(CallStatus::Active));
        assert!(CallStatus::Transferring.can_transition_to(CallStatus::Active));

        // One-way edges
        assert!(!CallStatus::Active.can_transition_to(CallStatus::Ringing));
        assert!(!CallStatus::Terminated.can_transition_to(CallStatus::Active));

        assert!(CallStatus::Terminated.is_terminal());
        assert!(!CallStatus::Hold.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CallStatus::Transferring).unwrap();
        assert_eq!(json, "\"transferring\"");
        assert_eq!(CallStatus::parse("hold"), Some(CallStatus::Hold));
        assert_eq!(CallStatus::parse("bogus"), None);
    }

    #[test]
    fn test_patch_apply_is_a_replace() {
        let record = Record::new("call-1", CallStatus::Active)
            .with("duration", FieldValue::Num(10.0))
            .with("caller", FieldValue::str("+15551234"));

        let patch = Patch::new()
            .set("duration", FieldValue::Num(11.0))
            .status(CallStatus::Hold);
        let next = patch.apply_to(&record);

        assert_eq!(next.field("duration"), Some(FieldValue::Num(11.0)));
        assert_eq!(next.field("caller"), Some(FieldValue::str("+15551234")));
        assert_eq!(next.status, CallStatus::Hold);
        // original untouched
        assert_eq!(record.field("duration"), Some(FieldValue::Num(10.0)));
        assert_eq!(record.status, CallStatus::Active);
    }
}
