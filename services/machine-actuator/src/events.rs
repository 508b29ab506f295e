//! Machine events.
//!
//! Recording is fire-and-forget: recorders swallow their own failures so an
//! event can never fail a reconciliation.

use std::sync::{Mutex, PoisonError};

use capg_api::Machine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

pub const REASON_CREATED: &str = "Created";
pub const REASON_FAILED_CREATE: &str = "FailedCreate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// Reference to the machine an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectReference {
    pub namespace: String,
    pub name: String,
}

impl From<&Machine> for ObjectReference {
    fn from(machine: &Machine) -> Self {
        Self {
            namespace: machine.namespace().to_string(),
            name: machine.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub involved_object: ObjectReference,
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Sink for machine events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: Event);

    /// Build and record an event about `machine`.
    fn event(&self, machine: &Machine, event_type: EventType, reason: &str, message: String) {
        self.record(Event {
            involved_object: machine.into(),
            event_type,
            reason: reason.to_string(),
            message,
            timestamp: Utc::now(),
        });
    }
}

/// Records events as log lines.
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        let object = format!(
            "{}/{}",
            event.involved_object.namespace, event.involved_object.name
        );
        match event.event_type {
            EventType::Normal => info!(
                object = %object,
                reason = %event.reason,
                message = %event.message,
                "Machine event"
            ),
            EventType::Warning => warn!(
                object = %object,
                reason = %event.reason,
                message = %event.message,
                "Machine event"
            ),
        }
    }
}

/// Keeps events in memory for assertions.
#[derive(Debug, Default)]
pub struct FakeRecorder {
    events: Mutex<Vec<Event>>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(type, reason)` of every recorded event, in order.
    pub fn reasons(&self) -> Vec<(EventType, String)> {
        self.events()
            .into_iter()
            .map(|e| (e.event_type, e.reason))
            .collect()
    }
}

impl EventRecorder for FakeRecorder {
    fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capg_api::ObjectMeta;

    #[test]
    fn test_fake_recorder_captures_events() {
        let machine = Machine {
            metadata: ObjectMeta {
                name: "worker-0".to_string(),
                namespace: "machines".to_string(),
            },
            ..Default::default()
        };
        let recorder = FakeRecorder::new();

        recorder.event(
            &machine,
            EventType::Normal,
            REASON_CREATED,
            "Created Machine worker-0".to_string(),
        );

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].involved_object.name, "worker-0");
        assert_eq!(events[0].involved_object.namespace, "machines");
        assert_eq!(
            recorder.reasons(),
            vec![(EventType::Normal, REASON_CREATED.to_string())]
        );
    }
}
