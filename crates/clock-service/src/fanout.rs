use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tempo_core::{Error, Result, Timestamp};
use tempo_ports::EventSink;

/// Broadcasts the active clock's events to every registered sink
///
/// Dispatch walks a snapshot of the subscriber list with the lock released,
/// and re-checks membership before each call: a sink unregistered from
/// inside a callback (itself or another) receives nothing further.
#[derive(Default)]
pub struct EventFanout {
    sinks: Mutex<Vec<Weak<dyn EventSink>>>,
}

fn same_sink(a: &Weak<dyn EventSink>, b: &Weak<dyn EventSink>) -> bool {
    std::ptr::eq(a.as_ptr() as *const (), b.as_ptr() as *const ())
}

impl EventFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        let mut sinks = self.sinks.lock();
        sinks.retain(|existing| existing.strong_count() > 0);
        if sinks.iter().any(|existing| same_sink(existing, &sink)) {
            return Err(Error::ResourceInUse("event sink is already registered".into()));
        }
        sinks.push(sink);
        Ok(())
    }

    pub fn unregister(&self, sink: &Weak<dyn EventSink>) -> Result<()> {
        let mut sinks = self.sinks.lock();
        let index = sinks
            .iter()
            .position(|existing| same_sink(existing, sink))
            .ok_or_else(|| Error::NotFound("event sink is not registered".into()))?;
        sinks.remove(index);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dispatch(&self, event: impl Fn(&dyn EventSink)) {
        let snapshot = self.sinks.lock().clone();
        for sink in &snapshot {
            let still_registered = self
                .sinks
                .lock()
                .iter()
                .any(|existing| same_sink(existing, sink));
            if !still_registered {
                continue;
            }
            if let Some(sink) = sink.upgrade() {
                event(sink.as_ref());
            }
        }
    }
}

impl EventSink for EventFanout {
    fn time_update_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.dispatch(|sink| sink.time_update_begin(old_time, new_time));
    }

    fn time_updating(&self, new_time: Timestamp) {
        self.dispatch(|sink| sink.time_updating(new_time));
    }

    fn time_update_end(&self, new_time: Timestamp) {
        self.dispatch(|sink| sink.time_update_end(new_time));
    }

    fn time_reset_begin(&self, old_time: Timestamp, new_time: Timestamp) {
        self.dispatch(|sink| sink.time_reset_begin(old_time, new_time));
    }

    fn time_reset_end(&self, new_time: Timestamp) {
        self.dispatch(|sink| sink.time_reset_end(new_time));
    }
}

/// Convenience for callers holding a strong reference
pub fn downgrade_sink<S: EventSink + 'static>(sink: &Arc<S>) -> Weak<dyn EventSink> {
    let sink: Arc<dyn EventSink> = sink.clone();
    Arc::downgrade(&sink)
}
