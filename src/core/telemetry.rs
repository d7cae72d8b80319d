use crate::core::SlotId;
use crate::core::slot::SlotKind;
use serde_json::json;
use std::cell::RefCell;

/// How a single slot recomputation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceOutcome {
    Computed,
    Failed(String),
}

/// A single entry in the evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    pub pass_version: u64,
    pub slot: SlotId,
    pub kind: SlotKind,
    pub value_type: String,
    pub depth: usize,
    pub outcome: TraceOutcome,
}

/// Trait for recording slot recomputations.
pub trait Telemetry {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    traces: RefCell<Vec<TraceEntry>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_traces(&self) -> Vec<TraceEntry> {
        self.traces.borrow().clone()
    }

    /// Number of successful recomputations recorded for `slot`.
    pub fn count_for(&self, slot: SlotId) -> usize {
        self.traces
            .borrow()
            .iter()
            .filter(|t| t.slot == slot && t.outcome == TraceOutcome::Computed)
            .count()
    }

    pub fn clear(&self) {
        self.traces.borrow_mut().clear();
    }

    /// Dumps the collected traces as a JSON array.
    pub fn to_json(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .traces
            .borrow()
            .iter()
            .map(|t| {
                let (outcome, error) = match &t.outcome {
                    TraceOutcome::Computed => ("computed", None),
                    TraceOutcome::Failed(msg) => ("failed", Some(msg.clone())),
                };
                json!({
                    "pass": t.pass_version,
                    "slot": t.slot.to_string(),
                    "kind": t.kind.to_string(),
                    "type": t.value_type,
                    "depth": t.depth,
                    "outcome": outcome,
                    "error": error,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, entry: TraceEntry) {
        self.traces.borrow_mut().push(entry);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(slot: SlotId, outcome: TraceOutcome) -> TraceEntry {
        TraceEntry {
            pass_version: 7,
            slot,
            kind: SlotKind::Output,
            value_type: "f32".into(),
            depth: 1,
            outcome,
        }
    }

    #[test]
    fn test_count_ignores_failures() {
        let telemetry = MemoryTelemetry::new();
        let slot = Uuid::new_v4();
        telemetry.record(entry(slot, TraceOutcome::Computed));
        telemetry.record(entry(slot, TraceOutcome::Failed("nope".into())));
        telemetry.record(entry(Uuid::new_v4(), TraceOutcome::Computed));

        assert_eq!(telemetry.count_for(slot), 1);
        assert_eq!(telemetry.get_traces().len(), 3);

        telemetry.clear();
        assert!(telemetry.get_traces().is_empty());
    }

    #[test]
    fn test_json_dump() {
        let telemetry = MemoryTelemetry::new();
        let slot = Uuid::new_v4();
        telemetry.record(entry(slot, TraceOutcome::Failed("nope".into())));

        let dump = telemetry.to_json();
        assert_eq!(dump[0]["outcome"], json!("failed"));
        assert_eq!(dump[0]["error"], json!("nope"));
        assert_eq!(dump[0]["kind"], json!("output"));
        assert_eq!(dump[0]["slot"], json!(slot.to_string()));
    }
}
