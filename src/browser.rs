// One record-browser instance: store, engines, selection, presets,
// dispatch, and persisted view layout behind a single facade

use crate::action::{ActionKind, ActionOutcome, ActionResult, ActionSink, BulkActionDispatcher};
use crate::clock::Clock;
use crate::config::BrowserConfig;
use crate::export::{self, ExportRequest, ExportScope};
use crate::filter::{self, Constraint, FilterSpec};
use crate::preset::{Preset, PresetStore};
use crate::record::{Patch, Record};
use crate::schema::Schema;
use crate::selection::SelectionModel;
use crate::sort::{self, SortKey};
use crate::storage::KvStorage;
use crate::store::{RecordStore, StoreError, TickSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub const VIEW_STATE_KEY: &str = "callgrid.view_state";

/// Layout and query state of one view, carried explicitly instead of in
/// ambient globals, and persisted between sessions as one JSON blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub expanded_sections: BTreeSet<String>,
    pub scroll_offset: u32,
    pub sort: Option<SortKey>,
    pub filter: FilterSpec,
}

impl ViewState {
    /// Load the persisted state; anything unreadable yields the default
    pub fn restore(storage: &dyn KvStorage) -> Self {
        let Some(raw) = storage.get(VIEW_STATE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!(?err, "stored view state is malformed, using defaults");
                Self::default()
            }
        }
    }

    pub fn persist(&self, storage: &mut dyn KvStorage) {
        let raw = match serde_json::to_string(self) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(?err, "failed to serialize view state");
                return;
            }
        };
        if let Err(err) = storage.set(VIEW_STATE_KEY, &raw) {
            warn!(?err, "failed to persist view state, keeping it in memory");
        }
    }
}

/// A live operational record browser.
///
/// Owns its store, selection, presets, and dispatcher exclusively;
/// independent browser instances share nothing. All operations run
/// synchronously on the caller's thread. External effects only enter
/// through the injected sink, storage, clock, and tick source.
pub struct RecordBrowser {
    schema: Schema,
    store: RecordStore,
    selection: SelectionModel,
    presets: PresetStore,
    dispatcher: BulkActionDispatcher,
    view_state: ViewState,
    storage: Box<dyn KvStorage>,
    clock: Box<dyn Clock>,
}

impl RecordBrowser {
    pub fn new(
        schema: Schema,
        storage: Box<dyn KvStorage>,
        sink: Box<dyn ActionSink>,
        clock: Box<dyn Clock>,
        config: &BrowserConfig,
    ) -> Self {
        let presets = PresetStore::hydrate(storage.as_ref());
        let view_state = ViewState::restore(storage.as_ref());
        Self {
            schema,
            store: RecordStore::new(),
            selection: SelectionModel::new(),
            presets,
            dispatcher: BulkActionDispatcher::new(sink, config.action_timeout_ms),
            view_state,
            storage,
            clock,
        }
    }

    /// Replace the whole collection, e.g. at page load
    pub fn load_records(&mut self, records: Vec<Record>) {
        self.store = RecordStore::from_records(records);
        self.prune_selection();
        debug!(records = self.store.len(), "records loaded");
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    // --- view -----------------------------------------------------------

    /// The filtered-and-sorted sequence currently presented
    pub fn view(&self) -> Vec<Record> {
        let filtered = filter::filter(self.store.records(), &self.schema, &self.view_state.filter);
        match &self.view_state.sort {
            Some(key) => sort::sort(&filtered, &self.schema, key),
            None => filtered,
        }
    }

    pub fn view_ids(&self) -> Vec<String> {
        self.view().into_iter().map(|r| r.id).collect()
    }

    pub fn filter_spec(&self) -> &FilterSpec {
        &self.view_state.filter
    }

    pub fn set_constraint(&mut self, field: impl Into<String>, constraint: Constraint) {
        self.view_state.filter.set(field, constraint);
    }

    pub fn clear_constraint(&mut self, field: &str) {
        self.view_state.filter.unset(field);
    }

    pub fn sort_key(&self) -> Option<&SortKey> {
        self.view_state.sort.as_ref()
    }

    /// Header-click sort: same field flips, new field takes its default
    pub fn sort_by(&mut self, field: &str) {
        let next = sort::toggle(self.view_state.sort.as_ref(), field, &self.schema);
        self.view_state.sort = Some(next);
    }

    // --- store mutation -------------------------------------------------

    pub fn insert_record(&mut self, record: Record) -> Result<(), StoreError> {
        self.store.insert(record)
    }

    pub fn update_record(&mut self, id: &str, patch: &Patch) -> Result<(), StoreError> {
        self.store.update(id, patch)
    }

    pub fn remove_record(&mut self, id: &str) -> Result<Record, StoreError> {
        let removed = self.store.remove(id)?;
        self.prune_selection();
        Ok(removed)
    }

    /// One simulated update cycle, then housekeeping: stale selections
    /// are pruned and overdue bulk actions time out
    pub fn tick(&mut self, source: &mut dyn TickSource) {
        self.store.tick(source);
        self.prune_selection();
        self.dispatcher.expire(self.clock.as_ref());
    }

    fn prune_selection(&mut self) {
        let existing = self.store.ids();
        self.selection.prune(&existing);
    }

    // --- selection ------------------------------------------------------

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn toggle_select(&mut self, id: &str) {
        self.selection.toggle(id);
    }

    pub fn select_all_view(&mut self) {
        let view_ids = self.view_ids();
        self.selection.select_all(&view_ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Replace the selection outright, e.g. from a restored session
    pub fn bulk_select(&mut self, ids: impl IntoIterator<Item = String>) {
        self.selection.bulk_set(ids);
        self.prune_selection();
    }

    /// Selected ids in current view order
    pub fn selected_in_view_order(&self) -> Vec<String> {
        self.view_ids()
            .into_iter()
            .filter(|id| self.selection.contains(id))
            .collect()
    }

    // --- presets --------------------------------------------------------

    pub fn save_preset(&mut self, name: impl Into<String>) -> Preset {
        self.presets.save(
            name,
            &self.view_state.filter,
            self.clock.as_ref(),
            self.storage.as_mut(),
        )
    }

    /// Merge a preset into the active filter: only fields the preset
    /// names are overwritten
    pub fn apply_preset(&mut self, id: &str) -> bool {
        match self.presets.load(id) {
            Some(preset) => {
                self.view_state.filter.merge_from(&preset.spec);
                true
            }
            None => false,
        }
    }

    pub fn delete_preset(&mut self, id: &str) -> bool {
        self.presets.delete(id, self.storage.as_mut())
    }

    pub fn presets(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    // --- export ---------------------------------------------------------

    pub fn export(&self, request: &ExportRequest) -> String {
        let view = self.view();
        let rows: Vec<Record> = match request.scope {
            ExportScope::Selection if !self.selection.is_empty() => view
                .into_iter()
                .filter(|r| self.selection.contains(&r.id))
                .collect(),
            _ => view,
        };
        export::build(&rows, &self.schema, &request.columns, request.format)
    }

    // --- bulk actions ---------------------------------------------------

    pub fn dispatch(&mut self, kind: ActionKind, ids: &[String]) -> Vec<ActionResult> {
        self.dispatcher
            .dispatch(kind, ids, self.store.records(), self.clock.as_ref())
    }

    /// Dispatch against the current selection, in view order
    pub fn dispatch_selected(&mut self, kind: ActionKind) -> Vec<ActionResult> {
        let ids = self.selected_in_view_order();
        self.dispatch(kind, &ids)
    }

    pub fn resolve_action(&mut self, kind: ActionKind, id: &str, outcome: ActionOutcome) {
        self.dispatcher.resolve(kind, id, outcome);
    }

    pub fn drain_settled_actions(&mut self) -> Vec<ActionResult> {
        self.dispatcher.drain_settled()
    }

    pub fn pending_actions(&self) -> usize {
        self.dispatcher.pending_len()
    }

    // --- view layout ----------------------------------------------------

    pub fn view_state(&self) -> &ViewState {
        &self.view_state
    }

    pub fn expand_section(&mut self, name: impl Into<String>) {
        self.view_state.expanded_sections.insert(name.into());
        self.view_state.persist(self.storage.as_mut());
    }

    pub fn collapse_section(&mut self, name: &str) {
        self.view_state.expanded_sections.remove(name);
        self.view_state.persist(self.storage.as_mut());
    }

    pub fn set_scroll_offset(&mut self, offset: u32) {
        self.view_state.scroll_offset = offset;
        self.view_state.persist(self.storage.as_mut());
    }

    pub fn save_view_state(&mut self) {
        self.view_state.persist(self.storage.as_mut());
    }

    /// View teardown: cancel outstanding bulk actions and persist the
    /// layout. The browser must not be used afterwards.
    pub fn teardown(&mut self) {
        self.dispatcher.cancel_all();
        self.save_view_state();
    }
}
