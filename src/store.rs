// Canonical record collection with atomic tick cycles

use crate::record::{Patch, Record};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("duplicate record id: {0}")]
    DuplicateKey(String),
    #[error("no record with id: {0}")]
    NotFound(String),
}

/// Mutations one update cycle wants to apply, computed against the prior
/// snapshot before any of them land
#[derive(Debug, Clone, Default)]
pub struct TickPlan {
    pub inserts: Vec<Record>,
    pub updates: Vec<(String, Patch)>,
    pub removes: Vec<String>,
}

impl TickPlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }
}

/// Producer of one simulated update cycle. Injected into `tick` so tests
/// drive updates directly instead of waiting on a timer.
pub trait TickSource {
    fn plan(&mut self, snapshot: &[Record]) -> TickPlan;
}

/// Insertion-ordered record collection.
///
/// All mutation goes through `insert`/`update`/`remove`/`tick`; each
/// published batch bumps the generation counter. `tick` is
/// compute-then-swap: the plan is evaluated against the prior records and
/// applied to a scratch copy, so a reader never sees half a cycle.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    generation: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load-time construction. Later duplicates of an id are dropped with
    /// a warning rather than failing the whole load.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            if let Err(err) = store.insert(record) {
                warn!(%err, "skipping record at load");
            }
        }
        store.generation = 0;
        store
    }

    /// Immutable copy of the current generation
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Borrowed view for the pure engines; no copy
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn insert(&mut self, record: Record) -> Result<(), StoreError> {
        if self.contains(&record.id) {
            return Err(StoreError::DuplicateKey(record.id));
        }
        self.records.push(record);
        self.generation += 1;
        Ok(())
    }

    /// Atomic replace-by-id: the patched record swaps in whole
    pub fn update(&mut self, id: &str, patch: &Patch) -> Result<(), StoreError> {
        let position = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.records[position] = patch.apply_to(&self.records[position]);
        self.generation += 1;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Record, StoreError> {
        let position = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = self.records.remove(position);
        self.generation += 1;
        Ok(removed)
    }

    /// Apply one update cycle from the injected source.
    ///
    /// The plan is computed against the prior snapshot, applied to a
    /// scratch copy, then published with a single swap; that swap is also
    /// the re-entrancy guard. A per-id conflict inside the plan is logged
    /// and skipped, never aborts the cycle.
    pub fn tick(&mut self, source: &mut dyn TickSource) {
        let plan = source.plan(&self.records);
        if plan.is_empty() {
            debug!(generation = self.generation, "tick produced no changes");
            return;
        }

        let mut next = self.records.clone();

        for (id, patch) in &plan.updates {
            match next.iter().position(|r| r.id == *id) {
                Some(position) => next[position] = patch.apply_to(&next[position]),
                None => warn!(id = %id, "tick update for unknown id, skipping"),
            }
        }
        for id in &plan.removes {
            match next.iter().position(|r| r.id == *id) {
                Some(position) => {
                    next.remove(position);
                }
                None => warn!(id = %id, "tick remove for unknown id, skipping"),
            }
        }
        for record in plan.inserts {
            if next.iter().any(|r| r.id == record.id) {
                warn!(id = %record.id, "tick insert for existing id, skipping");
                continue;
            }
            next.push(record);
        }

        self.records = next;
        self.generation += 1;
        debug!(
            generation = self.generation,
            records = self.records.len(),
            "tick published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CallStatus, FieldValue};

    fn call(id: &str, status: CallStatus, duration: f64) -> Record {
        Record::new(id, status).with("duration", FieldValue::Num(duration))
    }

    struct DurationBump;

    impl TickSource for DurationBump {
        fn plan(&mut self, snapshot: &[Record]) -> TickPlan {
            let mut plan = TickPlan::default();
            for record in snapshot {
                if record.status.is_terminal() {
                    continue;
                }
                let duration = record
                    .field("duration")
                    .and_then(|v| v.as_num())
                    .unwrap_or(0.0);
                plan.updates.push((
                    record.id.clone(),
                    Patch::new().set("duration", FieldValue::Num(duration + 1.0)),
                ));
            }
            plan
        }
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let mut store = RecordStore::new();
        store.insert(call("1", CallStatus::Active, 0.0)).unwrap();
        let err = store.insert(call("1", CallStatus::Ringing, 0.0)).unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey("1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let mut store = RecordStore::new();
        let err = store.update("ghost", &Patch::new()).unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".to_string()));
    }

    #[test]
    fn test_remove_unknown_id_fails() {
        let mut store = RecordStore::new();
        let err = store.remove("ghost").unwrap_err();
        assert_eq!(err, StoreError::NotFound("ghost".to_string()));
    }

    #[test]
    fn test_snapshot_is_detached_from_later_mutation() {
        let mut store = RecordStore::new();
        store.insert(call("1", CallStatus::Active, 10.0)).unwrap();
        let before = store.snapshot();
        store
            .update("1", &Patch::new().set("duration", FieldValue::Num(99.0)))
            .unwrap();
        assert_eq!(
            before[0].field("duration"),
            Some(FieldValue::Num(10.0))
        );
    }

    #[test]
    fn test_tick_increments_non_terminated_durations() {
        let mut store = RecordStore::from_records(vec![
            call("1", CallStatus::Active, 10.0),
            call("2", CallStatus::Hold, 5.0),
            call("3", CallStatus::Terminated, 60.0),
        ]);

        store.tick(&mut DurationBump);

        let durations: Vec<f64> = store
            .records()
            .iter()
            .map(|r| r.field("duration").and_then(|v| v.as_num()).unwrap())
            .collect();
        assert_eq!(durations, vec![11.0, 6.0, 60.0]);
    }

    #[test]
    fn test_tick_is_one_generation() {
        let mut store = RecordStore::from_records(vec![
            call("1", CallStatus::Active, 10.0),
            call("2", CallStatus::Hold, 5.0),
        ]);
        let before = store.generation();
        store.tick(&mut DurationBump);
        assert_eq!(store.generation(), before + 1);
    }

    #[test]
    fn test_empty_tick_publishes_nothing() {
        struct Quiet;
        impl TickSource for Quiet {
            fn plan(&mut self, _snapshot: &[Record]) -> TickPlan {
                TickPlan::default()
            }
        }
        let mut store = RecordStore::from_records(vec![call("1", CallStatus::Active, 1.0)]);
        let before = store.generation();
        store.tick(&mut Quiet);
        assert_eq!(store.generation(), before);
    }

    #[test]
    fn test_tick_plan_is_computed_against_prior_snapshot() {
        // The source patches "1" and removes it in the same cycle; the
        // remove wins and the cycle publishes cleanly.
        struct RemoveAndPatch;
        impl TickSource for RemoveAndPatch {
            fn plan(&mut self, _snapshot: &[Record]) -> TickPlan {
                TickPlan {
                    inserts: vec![],
                    updates: vec![(
                        "1".to_string(),
                        Patch::new().set("duration", FieldValue::Num(7.0)),
                    )],
                    removes: vec!["1".to_string()],
                }
            }
        }
        let mut store = RecordStore::from_records(vec![
            call("1", CallStatus::Active, 1.0),
            call("2", CallStatus::Active, 2.0),
        ]);
        store.tick(&mut RemoveAndPatch);
        assert!(!store.contains("1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_tick_insert_of_existing_id_is_skipped() {
        struct DupInsert;
        impl TickSource for DupInsert {
            fn plan(&mut self, _snapshot: &[Record]) -> TickPlan {
                TickPlan {
                    inserts: vec![call("1", CallStatus::Ringing, 0.0)],
                    updates: vec![],
                    removes: vec![],
                }
            }
        }
        let mut store = RecordStore::from_records(vec![call("1", CallStatus::Active, 9.0)]);
        store.tick(&mut DupInsert);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().status, CallStatus::Active);
    }
}
