// Telephony view schemas, demo datasets, and the simulated live feed

use crate::record::{CallStatus, FieldValue, Patch, Record};
use crate::schema::{FieldKind, FieldSpec, Schema};
use crate::store::{TickPlan, TickSource};

/// Columns of the call-management view
pub fn call_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("id", FieldKind::Text).required(),
        FieldSpec::new("caller", FieldKind::Text),
        FieldSpec::new("callee", FieldKind::Text),
        FieldSpec::new("queue", FieldKind::Tag),
        FieldSpec::new("status", FieldKind::Tag).required(),
        FieldSpec::new("started_at", FieldKind::Timestamp),
        FieldSpec::new("duration", FieldKind::Number),
    ])
}

/// Columns of the call-detail-records view
pub fn cdr_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("id", FieldKind::Text).required(),
        FieldSpec::new("caller", FieldKind::Text),
        FieldSpec::new("callee", FieldKind::Text),
        FieldSpec::new("started_at", FieldKind::Timestamp),
        FieldSpec::new("duration", FieldKind::Number),
        FieldSpec::new("disposition", FieldKind::Tag),
        FieldSpec::new("cost", FieldKind::Number),
    ])
}

/// Columns of the billing view
pub fn invoice_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("id", FieldKind::Text).required(),
        FieldSpec::new("customer", FieldKind::Text),
        FieldSpec::new("period", FieldKind::Text),
        FieldSpec::new("amount", FieldKind::Number).descending(),
        FieldSpec::new("issued_at", FieldKind::Timestamp),
        FieldSpec::new("state", FieldKind::Tag),
    ])
}

// Fixed load-time instant for the demo datasets: 2024-03-11T09:00:00Z
const T0: i64 = 1_710_147_600_000;

fn call(
    id: &str,
    caller: &str,
    callee: &str,
    queue: &str,
    status: CallStatus,
    offset_secs: i64,
    duration: f64,
) -> Record {
    Record::new(id, status)
        .with("caller", FieldValue::str(caller))
        .with("callee", FieldValue::str(callee))
        .with("queue", FieldValue::tag(queue))
        .with("started_at", FieldValue::Date(T0 + offset_secs * 1_000))
        .with("duration", FieldValue::Num(duration))
}

/// Live calls shown on the call-management view
pub fn sample_calls() -> Vec<Record> {
    vec![
        call("call-101", "+15550100", "+15550200", "support", CallStatus::Active, 0, 184.0),
        call("call-102", "+15550101", "+15550201", "support", CallStatus::Hold, 35, 149.0),
        call("call-103", "+15550102", "+15550202", "sales", CallStatus::Ringing, 170, 14.0),
        call("call-104", "+15550103", "+15550203", "sales", CallStatus::Active, 60, 124.0),
        call("call-105", "+15550104", "+15550204", "support", CallStatus::Transferring, 90, 94.0),
        call("call-106", "+15550105", "+15550205", "billing", CallStatus::Terminated, -600, 412.0),
    ]
}

fn cdr(
    id: &str,
    caller: &str,
    callee: &str,
    offset_secs: i64,
    duration: f64,
    disposition: &str,
    cost: f64,
) -> Record {
    Record::new(id, CallStatus::Terminated)
        .with("caller", FieldValue::str(caller))
        .with("callee", FieldValue::str(callee))
        .with("started_at", FieldValue::Date(T0 + offset_secs * 1_000))
        .with("duration", FieldValue::Num(duration))
        .with("disposition", FieldValue::tag(disposition))
        .with("cost", FieldValue::Num(cost))
}

/// Finished calls shown on the CDR view. One of the eight failed.
pub fn sample_cdrs() -> Vec<Record> {
    vec![
        cdr("cdr-001", "+15550110", "+15550210", -3_600, 245.0, "answered", 1.22),
        cdr("cdr-002", "+15550111", "+15550211", -3_540, 0.0, "failed", 0.0),
        cdr("cdr-003", "+15550112", "+15550212", -3_300, 611.0, "answered", 3.05),
        cdr("cdr-004", "+15550113", "+15550213", -3_000, 0.0, "busy", 0.0),
        cdr("cdr-005", "+15550114", "+15550214", -2_700, 0.0, "no_answer", 0.0),
        cdr("cdr-006", "+15550115", "+15550215", -2_400, 58.0, "answered", 0.29),
        cdr("cdr-007", "+15550116", "+15550216", -1_800, 0.0, "busy", 0.0),
        cdr("cdr-008", "+15550117", "+15550217", -900, 1_024.0, "answered", 5.12),
    ]
}

fn invoice(id: &str, customer: &str, period: &str, amount: f64, offset_days: i64, state: &str) -> Record {
    Record::new(id, CallStatus::Terminated)
        .with("customer", FieldValue::str(customer))
        .with("period", FieldValue::str(period))
        .with("amount", FieldValue::Num(amount))
        .with("issued_at", FieldValue::Date(T0 + offset_days * 86_400_000))
        .with("state", FieldValue::tag(state))
}

/// Invoices shown on the billing view
pub fn sample_invoices() -> Vec<Record> {
    vec![
        invoice("inv-2024-031", "Acme Logistics", "2024-02", 1_240.50, -9, "paid"),
        invoice("inv-2024-032", "Borealis Media", "2024-02", 86.00, -9, "sent"),
        invoice("inv-2024-033", "Cobalt Health", "2024-02", 412.75, -8, "overdue"),
        invoice("inv-2024-034", "Acme Logistics", "2024-03", 998.10, -1, "draft"),
    ]
}

/// The 1-second counter tick: every non-terminated call accrues one
/// second of talk time
#[derive(Debug, Default)]
pub struct CounterTick;

impl TickSource for CounterTick {
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

/// Deterministic stand-in for the live call feed: durations accrue every
/// cycle, ringing calls connect on even cycles, every third cycle a new
/// inbound call starts ringing, and every fifth cycle the longest-running
/// active call wraps up.
#[derive(Debug, Default)]
pub struct FeedSimulator {
    cycle: u64,
    spawned: u32,
}

impl FeedSimulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickSource for FeedSimulator {
    fn plan(&mut self, snapshot: &[Record]) -> TickPlan {
        self.cycle += 1;
        let mut plan = CounterTick.plan(snapshot);

        if self.cycle % 2 == 0 {
            if let Some(ringing) = snapshot.iter().find(|r| r.status == CallStatus::Ringing) {
                plan.updates.push((
                    ringing.id.clone(),
                    Patch::new().status(CallStatus::Active),
                ));
            }
        }

        if self.cycle % 5 == 0 {
            let longest = snapshot
                .iter()
                .filter(|r| r.status == CallStatus::Active)
                .max_by(|a, b| {
                    let a = a.field("duration").and_then(|v| v.as_num()).unwrap_or(0.0);
                    let b = b.field("duration").and_then(|v| v.as_num()).unwrap_or(0.0);
                    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
                });
            if let Some(record) = longest {
                plan.updates.push((
                    record.id.clone(),
                    Patch::new().status(CallStatus::Terminated),
                ));
            }
        }

        if self.cycle % 3 == 0 {
            self.spawned += 1;
            let n = self.spawned;
            plan.inserts.push(call(
                &format!("call-sim-{n:03}"),
                &format!("+1555100{n:02}"),
                "+15550200",
                "support",
                CallStatus::Ringing,
                0,
                0.0,
            ));
        }

        plan
    }
}
