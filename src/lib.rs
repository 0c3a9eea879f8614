// CallGrid - live operational record browser for telephony dashboards

pub mod action;
pub mod browser;
pub mod clock;
pub mod config;
pub mod export;
pub mod filter;
pub mod models;
pub mod preset;
pub mod record;
pub mod schema;
pub mod scheduler;
pub mod selection;
pub mod sort;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use action::{
    ActionKind, ActionOutcome, ActionResult, ActionSink, BulkActionDispatcher, FailureReason,
    SinkReply,
};
pub use browser::{RecordBrowser, ViewState};
pub use clock::{Clock, ManualClock, SystemClock, now_ms};
pub use config::BrowserConfig;
pub use export::{ExportFormat, ExportRequest, ExportScope};
pub use filter::{Constraint, FilterSpec};
pub use preset::{Preset, PresetStore};
pub use record::{CallStatus, FieldValue, Patch, Record};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use scheduler::{ManualScheduler, Scheduler};
pub use selection::SelectionModel;
pub use sort::{Direction, SortKey};
pub use storage::{KvStorage, MemoryStorage, SqliteStorage};
pub use store::{RecordStore, StoreError, TickPlan, TickSource};
