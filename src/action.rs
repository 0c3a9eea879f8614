// Bulk actions: per-id dispatch against an injected external handler

use crate::clock::Clock;
use crate::record::{CallStatus, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Closed set of bulk actions. Every kind names a target call status, so
/// legality is checked against the state machine before anything is
/// forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Terminate,
    Hold,
    Resume,
    Transfer,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Terminate => "terminate",
            ActionKind::Hold => "hold",
            ActionKind::Resume => "resume",
            ActionKind::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "terminate" => Some(ActionKind::Terminate),
            "hold" => Some(ActionKind::Hold),
            "resume" => Some(ActionKind::Resume),
            "transfer" => Some(ActionKind::Transfer),
            _ => None,
        }
    }

    pub fn target_status(&self) -> CallStatus {
        match self {
            ActionKind::Terminate => CallStatus::Terminated,
            ActionKind::Hold => CallStatus::Hold,
            ActionKind::Resume => CallStatus::Active,
            ActionKind::Transfer => CallStatus::Transferring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    InvalidStateTransition,
    AlreadyPending,
    TimedOut,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    /// Forwarded to the sink, completion still outstanding
    Pending,
    Failure(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub id: String,
    pub outcome: ActionOutcome,
}

/// What the sink did with one forwarded action
#[derive(Debug, Clone, PartialEq)]
pub enum SinkReply {
    Done,
    Rejected(String),
    /// Effect runs externally; resolve via `BulkActionDispatcher::resolve`
    Pending,
}

/// External handler for the real telephony/billing effect. The dispatcher
/// never applies the effect itself.
pub trait ActionSink {
    fn submit(&mut self, kind: ActionKind, record: &Record) -> SinkReply;
}

/// Applies a named action to a set of ids and aggregates per-id outcomes.
///
/// Each id is handled independently; one failure never aborts the rest.
/// Concurrent dispatch of the same `(kind, id)` pair is refused while the
/// first is pending, pending actions time out against the injected clock,
/// and `cancel_all` (view teardown) drops everything outstanding so no
/// late completion lands on a disposed browser.
pub struct BulkActionDispatcher {
    sink: Box<dyn ActionSink>,
    timeout_ms: i64,
    /// (kind, id) -> deadline ms
    pending: HashMap<(ActionKind, String), i64>,
    settled: Vec<ActionResult>,
    disposed: bool,
}

impl BulkActionDispatcher {
    pub fn new(sink: Box<dyn ActionSink>, timeout_ms: i64) -> Self {
        Self {
            sink,
            timeout_ms,
            pending: HashMap::new(),
            settled: Vec::new(),
            disposed: false,
        }
    }

    pub fn dispatch(
        &mut self,
        kind: ActionKind,
        ids: &[String],
        records: &[Record],
        clock: &dyn Clock,
    ) -> Vec<ActionResult> {
        let by_id: HashMap<&str, &Record> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        let deadline = clock.now_ms() + self.timeout_ms;

        ids.iter()
            .map(|id| {
                let outcome = self.dispatch_one(kind, id, &by_id, deadline);
                ActionResult {
                    id: id.clone(),
                    outcome,
                }
            })
            .collect()
    }

    fn dispatch_one(
        &mut self,
        kind: ActionKind,
        id: &str,
        by_id: &HashMap<&str, &Record>,
        deadline: i64,
    ) -> ActionOutcome {
        if self.disposed {
            return ActionOutcome::Failure(FailureReason::Rejected("browser disposed".into()));
        }
        let Some(record) = by_id.get(id) else {
            return ActionOutcome::Failure(FailureReason::NotFound);
        };
        if !record.status.can_transition_to(kind.target_status()) {
            return ActionOutcome::Failure(FailureReason::InvalidStateTransition);
        }
        let guard_key = (kind, id.to_string());
        if self.pending.contains_key(&guard_key) {
            return ActionOutcome::Failure(FailureReason::AlreadyPending);
        }
        match self.sink.submit(kind, record) {
            SinkReply::Done => ActionOutcome::Success,
            SinkReply::Rejected(reason) => ActionOutcome::Failure(FailureReason::Rejected(reason)),
            SinkReply::Pending => {
                self.pending.insert(guard_key, deadline);
                ActionOutcome::Pending
            }
        }
    }

    /// Completion callback for a previously-Pending action. Unknown or
    /// already-cancelled pairs are ignored.
    pub fn resolve(&mut self, kind: ActionKind, id: &str, outcome: ActionOutcome) {
        if self.disposed {
            debug!(kind = kind.as_str(), id, "completion after teardown, dropped");
            return;
        }
        if self.pending.remove(&(kind, id.to_string())).is_none() {
            debug!(kind = kind.as_str(), id, "completion for unknown action, dropped");
            return;
        }
        self.settled.push(ActionResult {
            id: id.to_string(),
            outcome,
        });
    }

    /// Resolve every pending action whose deadline has passed as TimedOut
    pub fn expire(&mut self, clock: &dyn Clock) {
        let now = clock.now_ms();
        let overdue: Vec<(ActionKind, String)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(key, _)| key.clone())
            .collect();
        for (kind, id) in overdue {
            warn!(kind = kind.as_str(), id = %id, "bulk action timed out");
            self.pending.remove(&(kind, id.clone()));
            self.settled.push(ActionResult {
                id,
                outcome: ActionOutcome::Failure(FailureReason::TimedOut),
            });
        }
    }

    /// View teardown: nothing outstanding may complete afterwards
    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "cancelling pending bulk actions");
        }
        self.pending.clear();
        self.disposed = true;
    }

    /// Late results produced by `resolve`/`expire` since the last drain
    pub fn drain_settled(&mut self) -> Vec<ActionResult> {
        std::mem::take(&mut self.settled)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::record::FieldValue;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct ReplySink {
        reply: SinkReply,
        submitted: Rc<RefCell<Vec<(ActionKind, String)>>>,
    }

    impl ReplySink {
        fn new(reply: SinkReply) -> (Self, Rc<RefCell<Vec<(ActionKind, String)>>>) {
            let submitted = Rc::new(RefCell::new(Vec::new()));
            (
                Self {
                    reply,
                    submitted: submitted.clone(),
                },
                submitted,
            )
        }
    }

    impl ActionSink for ReplySink {
        fn submit(&mut self, kind: ActionKind, record: &Record) -> SinkReply {
            self.submitted.borrow_mut().push((kind, record.id.clone()));
            self.reply.clone()
        }
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new("1", CallStatus::Active).with("duration", FieldValue::Num(10.0)),
            Record::new("2", CallStatus::Terminated).with("duration", FieldValue::Num(5.0)),
        ]
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_terminal_record_fails_loudly_without_aborting_the_batch() {
        let (sink, submitted) = ReplySink::new(SinkReply::Done);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        let results = dispatcher.dispatch(ActionKind::Terminate, &ids(&["1", "2"]), &records(), &clock);

        assert_eq!(
            results,
            vec![
                ActionResult {
                    id: "1".to_string(),
                    outcome: ActionOutcome::Success,
                },
                ActionResult {
                    id: "2".to_string(),
                    outcome: ActionOutcome::Failure(FailureReason::InvalidStateTransition),
                },
            ]
        );
        // the guarded id never reached the sink
        assert_eq!(submitted.borrow().len(), 1);
    }

    #[test]
    fn test_unknown_id_fails_that_id_only() {
        let (sink, _) = ReplySink::new(SinkReply::Done);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        let results = dispatcher.dispatch(ActionKind::Hold, &ids(&["ghost", "1"]), &records(), &clock);
        assert_eq!(results[0].outcome, ActionOutcome::Failure(FailureReason::NotFound));
        assert_eq!(results[1].outcome, ActionOutcome::Success);
    }

    #[test]
    fn test_illegal_transition_is_guarded_for_live_records_too() {
        // Resume targets Active; an already-active call cannot take it
        let (sink, submitted) = ReplySink::new(SinkReply::Done);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        let results = dispatcher.dispatch(ActionKind::Resume, &ids(&["1"]), &records(), &clock);
        assert_eq!(
            results[0].outcome,
            ActionOutcome::Failure(FailureReason::InvalidStateTransition)
        );
        assert!(submitted.borrow().is_empty());
    }

    #[test]
    fn test_concurrent_dispatch_of_same_pair_is_refused() {
        let (sink, submitted) = ReplySink::new(SinkReply::Pending);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        let first = dispatcher.dispatch(ActionKind::Terminate, &ids(&["1"]), &records(), &clock);
        assert_eq!(first[0].outcome, ActionOutcome::Pending);

        let second = dispatcher.dispatch(ActionKind::Terminate, &ids(&["1"]), &records(), &clock);
        assert_eq!(
            second[0].outcome,
            ActionOutcome::Failure(FailureReason::AlreadyPending)
        );
        assert_eq!(submitted.borrow().len(), 1);

        // A different kind for the same id is not guarded
        let hold = dispatcher.dispatch(ActionKind::Hold, &ids(&["1"]), &records(), &clock);
        assert_eq!(hold[0].outcome, ActionOutcome::Pending);
    }

    #[test]
    fn test_resolve_settles_a_pending_action() {
        let (sink, _) = ReplySink::new(SinkReply::Pending);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        dispatcher.dispatch(ActionKind::Terminate, &ids(&["1"]), &records(), &clock);
        dispatcher.resolve(ActionKind::Terminate, "1", ActionOutcome::Success);

        assert_eq!(dispatcher.pending_len(), 0);
        let settled = dispatcher.drain_settled();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].outcome, ActionOutcome::Success);
        // drained once, gone
        assert!(dispatcher.drain_settled().is_empty());
    }

    #[test]
    fn test_pending_action_times_out() {
        let (sink, _) = ReplySink::new(SinkReply::Pending);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 5_000);
        let clock = ManualClock::new(0);

        dispatcher.dispatch(ActionKind::Transfer, &ids(&["1"]), &records(), &clock);

        clock.advance(4_999);
        dispatcher.expire(&clock);
        assert_eq!(dispatcher.pending_len(), 1);

        clock.advance(1);
        dispatcher.expire(&clock);
        assert_eq!(dispatcher.pending_len(), 0);
        let settled = dispatcher.drain_settled();
        assert_eq!(
            settled[0].outcome,
            ActionOutcome::Failure(FailureReason::TimedOut)
        );
    }

    #[test]
    fn test_cancel_all_suppresses_late_completions() {
        let (sink, _) = ReplySink::new(SinkReply::Pending);
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        dispatcher.dispatch(ActionKind::Terminate, &ids(&["1"]), &records(), &clock);
        dispatcher.cancel_all();

        dispatcher.resolve(ActionKind::Terminate, "1", ActionOutcome::Success);
        assert!(dispatcher.drain_settled().is_empty());

        // New dispatches after teardown are refused
        let results = dispatcher.dispatch(ActionKind::Hold, &ids(&["1"]), &records(), &clock);
        assert!(matches!(
            results[0].outcome,
            ActionOutcome::Failure(FailureReason::Rejected(_))
        ));
    }

    #[test]
    fn test_sink_rejection_is_reported_per_id() {
        let (sink, _) = ReplySink::new(SinkReply::Rejected("trunk busy".to_string()));
        let mut dispatcher = BulkActionDispatcher::new(Box::new(sink), 30_000);
        let clock = ManualClock::new(0);

        let results = dispatcher.dispatch(ActionKind::Hold, &ids(&["1"]), &records(), &clock);
        assert_eq!(
            results[0].outcome,
            ActionOutcome::Failure(FailureReason::Rejected("trunk busy".to_string()))
        );
    }
}
