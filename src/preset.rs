// Named, persisted filter snapshots

use crate::clock::Clock;
use crate::filter::FilterSpec;
use crate::storage::KvStorage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

pub const STORAGE_KEY: &str = "callgrid.presets";

/// A saved filter. Immutable once created; "editing" a preset means
/// saving a new one. Names are free-form and need not be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub spec: FilterSpec,
    pub created_at: i64,
}

/// Preset collection, hydrated from storage and written back on every
/// change. A failed write leaves the in-memory set authoritative.
#[derive(Debug, Default)]
pub struct PresetStore {
    presets: Vec<Preset>,
}

impl PresetStore {
    /// Load saved presets. A missing key, unreadable backend, or
    /// malformed blob all start the store empty with a warning, never an
    /// error.
    pub fn hydrate(storage: &dyn KvStorage) -> Self {
        let Some(raw) = storage.get(STORAGE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<Vec<Preset>>(&raw) {
            Ok(presets) => {
                debug!(count = presets.len(), "loaded presets");
                Self { presets }
            }
            Err(err) => {
                warn!(?err, "stored presets are malformed, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(
        &mut self,
        name: impl Into<String>,
        spec: &FilterSpec,
        clock: &dyn Clock,
        storage: &mut dyn KvStorage,
    ) -> Preset {
        let preset = Preset {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            spec: spec.clone(),
            created_at: clock.now_ms(),
        };
        self.presets.push(preset.clone());
        self.persist(storage);
        preset
    }

    pub fn load(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn delete(&mut self, id: &str, storage: &mut dyn KvStorage) -> bool {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        let deleted = self.presets.len() != before;
        if deleted {
            self.persist(storage);
        }
        deleted
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    fn persist(&self, storage: &mut dyn KvStorage) {
        let raw = match serde_json::to_string(&self.presets) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(?err, "failed to serialize presets");
                return;
            }
        };
        if let Err(err) = storage.set(STORAGE_KEY, &raw) {
            warn!(?err, "failed to persist presets, keeping them in memory");
        }
    }
}
