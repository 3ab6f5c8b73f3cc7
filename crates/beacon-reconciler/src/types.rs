use uuid::Uuid;

/// Events the Reconciler emits for downstream incident management once a
/// Task reaches a terminal state. Exactly one is emitted per task,
/// even under redelivery.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedEvent {
    CheckOk { check_id: Uuid, task_id: Uuid },
    CheckFailed {
        check_id: Uuid,
        task_id: Uuid,
        error_message: Option<String>,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: DerivedEvent);
}

/// Test/observation double recording every emitted event in order.
#[derive(Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<DerivedEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DerivedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DerivedEvent) {
        self.events.lock().unwrap().push(event);
    }
}
