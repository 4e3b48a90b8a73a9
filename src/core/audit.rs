//! Audit journal of slot lifecycle transitions.
//!
//! Events are recorded with the queue mutex held, so the journal order is the order in
//! which transitions actually happened.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::slot::{JobKind, SlotId};
use crate::util::clock::now_ms;

/// Transition recorded for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Slot handed to a caller.
    Acquired,
    /// Unit of work attached without starting.
    Registered,
    /// Parked in the admission gate.
    ParkedForCapacity,
    /// Handed a seat by a finishing slot.
    Readmitted,
    /// Parked until `blocker` ends.
    ParkedForConflict {
        /// Slot whose unit conflicts.
        blocker: SlotId,
    },
    /// Admitted and running.
    Started,
    /// Parked slots woken because this one ended or was released.
    WaitersReleased {
        /// Number of slots woken.
        count: usize,
    },
    /// Unit of work finished; slot back to idle.
    Ended,
    /// Slot returned to the registry.
    Released,
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Slot the transition happened on.
    pub slot: SlotId,
    /// Tag of the slot at the time of the event.
    pub kind: JobKind,
    /// What happened.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Bounded in-memory audit sink for testing and dev.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink keeping at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }

    /// Actions recorded for one slot, oldest first.
    #[must_use]
    pub fn actions_for(&self, slot: SlotId) -> Vec<AuditAction> {
        self.events
            .iter()
            .filter(|e| e.slot == slot)
            .map(|e| e.action.clone())
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared sink: the queue records into it while the caller keeps a clone to read from.
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Helper to build an audit event stamped with the current time.
#[must_use]
pub fn build_audit_event(slot: SlotId, kind: JobKind, action: AuditAction) -> AuditEvent {
    AuditEvent {
        slot,
        kind,
        action,
        created_at_ms: now_ms(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_for_filters_by_slot() {
        let mut sink = InMemoryAuditSink::new(8);
        sink.record(build_audit_event(SlotId::new(0), JobKind(1), AuditAction::Acquired));
        sink.record(build_audit_event(SlotId::new(1), JobKind(1), AuditAction::Acquired));
        sink.record(build_audit_event(SlotId::new(0), JobKind(1), AuditAction::Started));

        assert_eq!(
            sink.actions_for(SlotId::new(0)),
            vec![AuditAction::Acquired, AuditAction::Started]
        );
    }

    #[test]
    fn test_zero_capacity_sink_drops_everything() {
        let mut sink = InMemoryAuditSink::new(0);
        sink.record(build_audit_event(SlotId::new(0), JobKind(0), AuditAction::Ended));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_shared_sink_records_through_arc() {
        let shared = Arc::new(Mutex::new(InMemoryAuditSink::new(4)));
        let mut writer = Arc::clone(&shared);
        writer.record(build_audit_event(SlotId::new(2), JobKind(0), AuditAction::Released));
        assert_eq!(shared.lock().events().len(), 1);
    }
}
