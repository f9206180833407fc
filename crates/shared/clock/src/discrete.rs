use crate::clock_core::ClockCore;
use std::sync::Weak;
use tempo_core::{Result, Timestamp};
use tempo_ports::{Clock, ClockType, EventSink};

/// Clock advanced in explicit steps by its driver
///
/// The driver (a stepping thread, a sync slave) calls [`set_new_time`] and
/// [`set_reset_time`]. Sinks receive the full update triple or the reset pair.
///
/// [`set_new_time`]: DiscreteClock::set_new_time
/// [`set_reset_time`]: DiscreteClock::set_reset_time
pub struct DiscreteClock {
    core: ClockCore,
}

impl DiscreteClock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ClockCore::new(name),
        }
    }

    /// Advance to `new_time`
    ///
    /// The first call after start, or a step backward, is published as a
    /// reset instead. `time_updating` is always sent for an update; the
    /// begin/end pair only if `send_update_before_after` is set.
    pub fn set_new_time(&self, new_time: Timestamp, send_update_before_after: bool) {
        self.core.step(new_time, send_update_before_after);
    }

    /// Jump to `new_time`, publishing the reset pair
    pub fn set_reset_time(&self, new_time: Timestamp) {
        self.core.reset_to(new_time);
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }
}

impl Clock for DiscreteClock {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Discrete
    }

    fn now(&self) -> Timestamp {
        self.core.time()
    }

    fn reset(&self) {
        self.set_reset_time(Timestamp::ZERO);
    }

    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        self.core.start(sink, Timestamp::ZERO);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.core.unbind();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClockEvent, EventRecorder};
    use std::sync::Arc;

    fn started() -> (DiscreteClock, Arc<EventRecorder>) {
        let clock = DiscreteClock::new("discrete");
        let recorder = Arc::new(EventRecorder::new());
        let sink: Arc<dyn EventSink> = recorder.clone();
        clock.start(Arc::downgrade(&sink)).unwrap();
        recorder.take();
        (clock, recorder)
    }

    #[test]
    fn test_first_update_after_start_is_reset() {
        let (clock, recorder) = started();
        clock.set_new_time(Timestamp(100), true);

        assert_eq!(
            recorder.events(),
            vec![
                ClockEvent::ResetBegin {
                    old: Timestamp::ZERO,
                    new: Timestamp(100)
                },
                ClockEvent::ResetEnd {
                    new: Timestamp(100)
                },
            ]
        );
        assert_eq!(clock.now(), Timestamp(100));
    }

    #[test]
    fn test_update_triple() {
        let (clock, recorder) = started();
        clock.set_new_time(Timestamp(10), true);
        recorder.take();

        clock.set_new_time(Timestamp(20), true);
        assert_eq!(
            recorder.events(),
            vec![
                ClockEvent::UpdateBegin {
                    old: Timestamp(10),
                    new: Timestamp(20)
                },
                ClockEvent::Updating { new: Timestamp(20) },
                ClockEvent::UpdateEnd { new: Timestamp(20) },
            ]
        );
    }

    #[test]
    fn test_update_without_before_after_still_sends_updating() {
        let (clock, recorder) = started();
        clock.set_new_time(Timestamp(10), false);
        recorder.take();

        clock.set_new_time(Timestamp(20), false);
        assert_eq!(
            recorder.events(),
            vec![ClockEvent::Updating { new: Timestamp(20) }]
        );
    }

    #[test]
    fn test_backward_step_is_reset() {
        let (clock, recorder) = started();
        clock.set_new_time(Timestamp(50), true);
        clock.set_new_time(Timestamp(60), true);
        recorder.take();

        clock.set_new_time(Timestamp(30), true);
        assert_eq!(
            recorder.events(),
            vec![
                ClockEvent::ResetBegin {
                    old: Timestamp(60),
                    new: Timestamp(30)
                },
                ClockEvent::ResetEnd { new: Timestamp(30) },
            ]
        );
    }

    #[test]
    fn test_equal_step_is_an_update() {
        let (clock, recorder) = started();
        clock.set_new_time(Timestamp(10), false);
        recorder.take();

        clock.set_new_time(Timestamp(10), false);
        assert_eq!(
            recorder.events(),
            vec![ClockEvent::Updating { new: Timestamp(10) }]
        );
    }

    #[test]
    fn test_sink_may_read_clock_from_callback() {
        struct Reader {
            clock: Arc<DiscreteClock>,
            seen: parking_lot::Mutex<Vec<Timestamp>>,
        }
        impl EventSink for Reader {
            fn time_update_begin(&self, _: Timestamp, _: Timestamp) {}
            fn time_updating(&self, _: Timestamp) {
                self.seen.lock().push(self.clock.now());
            }
            fn time_update_end(&self, _: Timestamp) {}
            fn time_reset_begin(&self, _: Timestamp, _: Timestamp) {}
            fn time_reset_end(&self, _: Timestamp) {}
        }

        let clock = Arc::new(DiscreteClock::new("reentrant"));
        let reader = Arc::new(Reader {
            clock: clock.clone(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let sink: Arc<dyn EventSink> = reader.clone();
        clock.start(Arc::downgrade(&sink)).unwrap();
        clock.set_new_time(Timestamp(1), true);
        clock.set_new_time(Timestamp(2), true);

        assert_eq!(*reader.seen.lock(), vec![Timestamp(2)]);
    }
}
