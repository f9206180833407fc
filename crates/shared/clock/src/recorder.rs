use parking_lot::Mutex;
use tempo_core::Timestamp;
use tempo_ports::EventSink;

/// A clock event as observed by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    UpdateBegin { old: Timestamp, new: Timestamp },
    Updating { new: Timestamp },
    UpdateEnd { new: Timestamp },
    ResetBegin { old: Timestamp, new: Timestamp },
    ResetEnd { new: Timestamp },
}

/// Event sink that records every event it receives, in order
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ClockEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClockEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<ClockEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn reset_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, ClockEvent::ResetBegin { .. }))
            .count()
    }

    fn push(&self, event: ClockEvent) {
        self.events.lock().push(event);
    }
}

impl EventSink for EventRecorder {
    fn time_update_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.push(ClockEvent::UpdateBegin {
            old: old_time,
            new: new_time,
        });
    }

    fn time_updating(&self, new_time: Timestamp) {
        self.push(ClockEvent::Updating { new: new_time });
    }

    fn time_update_end(&self, new_time: Timestamp) {
        self.push(ClockEvent::UpdateEnd { new: new_time });
    }

    fn time_reset_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.push(ClockEvent::ResetBegin {
            old: old_time,
            new: new_time,
        });
    }

    fn time_reset_end(&self, new_time: Timestamp) {
        self.push(ClockEvent::ResetEnd { new: new_time });
    }
}
