use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tempo_core::Timestamp;
use tempo_ports::EventSink;

/// Bookkeeping shared by the continuous and discrete clock variants
///
/// One lock guards the time, the bound sink and the start flags. Event sinks
/// are always called after the lock has been released, with the old/new times
/// and the upgraded sink copied out first, so a sink may call back into the
/// clock.
pub(crate) struct ClockCore {
    name: String,
    state: Mutex<CoreState>,
}

struct CoreState {
    current_time: Timestamp,
    sink: Option<Weak<dyn EventSink>>,
    started: bool,
    /// The first time change after `start` is published as a reset unless an
    /// explicit reset came first
    first_change_pending: bool,
}

/// Copied-out view of a pending transition
struct Transition {
    old_time: Timestamp,
    sink: Option<Arc<dyn EventSink>>,
    is_reset: bool,
}

impl ClockCore {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(CoreState {
                current_time: Timestamp::ZERO,
                sink: None,
                started: false,
                first_change_pending: false,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn time(&self) -> Timestamp {
        self.state.lock().current_time
    }

    pub(crate) fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Bind `sink`, publish the start reset, then arm the first-change reset
    pub(crate) fn start(&self, sink: Weak<dyn EventSink>, reset_time: Timestamp) {
        {
            let mut state = self.state.lock();
            state.sink = Some(sink);
            state.started = true;
        }
        self.reset_to(reset_time);
        self.state.lock().first_change_pending = true;
    }

    pub(crate) fn unbind(&self) {
        let mut state = self.state.lock();
        state.sink = None;
        state.started = false;
        state.first_change_pending = false;
    }

    /// Sample a continuous source under the lock and publish the result
    ///
    /// Sampling and comparing happen atomically so that two concurrent readers
    /// cannot make time appear to run backward. Returns the sampled time.
    pub(crate) fn sample(&self, source: impl FnOnce() -> Timestamp) -> Timestamp {
        let (new_time, transition) = {
            let mut state = self.state.lock();
            let new_time = source();
            let first = std::mem::take(&mut state.first_change_pending);
            if !first && new_time >= state.current_time {
                state.current_time = new_time;
                return new_time;
            }
            (
                new_time,
                Transition {
                    old_time: state.current_time,
                    sink: Self::upgrade(&state),
                    is_reset: true,
                },
            )
        };
        self.publish_reset(new_time, transition);
        new_time
    }

    /// Move a discrete clock to `new_time`
    ///
    /// A backward step, or the first step after start, is published as a reset.
    pub(crate) fn step(&self, new_time: Timestamp, send_update_before_after: bool) {
        let transition = {
            let mut state = self.state.lock();
            let first = std::mem::take(&mut state.first_change_pending);
            Transition {
                old_time: state.current_time,
                sink: Self::upgrade(&state),
                is_reset: first || new_time < state.current_time,
            }
        };

        if transition.is_reset {
            self.publish_reset(new_time, transition);
            return;
        }

        if send_update_before_after {
            if let Some(sink) = &transition.sink {
                sink.time_update_begin(transition.old_time, new_time);
            }
        }
        self.store(new_time);
        if let Some(sink) = &transition.sink {
            sink.time_updating(new_time);
            if send_update_before_after {
                sink.time_update_end(new_time);
            }
        }
    }

    /// Unconditionally reset to `new_time`
    pub(crate) fn reset_to(&self, new_time: Timestamp) {
        let transition = {
            let mut state = self.state.lock();
            state.first_change_pending = false;
            Transition {
                old_time: state.current_time,
                sink: Self::upgrade(&state),
                is_reset: true,
            }
        };
        self.publish_reset(new_time, transition);
    }

    fn publish_reset(&self, new_time: Timestamp, transition: Transition) {
        if let Some(sink) = &transition.sink {
            sink.time_reset_begin(transition.old_time, new_time);
        }
        self.store(new_time);
        if let Some(sink) = &transition.sink {
            sink.time_reset_end(new_time);
        }
    }

    fn store(&self, new_time: Timestamp) {
        self.state.lock().current_time = new_time;
    }

    fn upgrade(state: &CoreState) -> Option<Arc<dyn EventSink>> {
        state.sink.as_ref().and_then(Weak::upgrade)
    }
}
