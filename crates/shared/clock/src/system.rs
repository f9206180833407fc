use crate::continuous::{ContinuousClock, ContinuousTimeSource};
use parking_lot::Mutex;
use std::time::Instant;
use tempo_core::{Duration, Timestamp};

/// Name of the built-in continuous wall clock
pub const LOCAL_SYSTEM_REALTIME: &str = "local_system_realtime";

/// Name of the built-in stepped simulation clock
pub const LOCAL_SYSTEM_SIMTIME: &str = "local_system_simtime";

/// Monotonic system time measured from the last reset point
///
/// Uses `Instant`, never the wall-clock date, so time cannot jump when the
/// host adjusts its clock.
#[derive(Debug)]
pub struct SteadyTimeSource {
    origin: Mutex<Instant>,
}

impl SteadyTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Mutex::new(Instant::now()),
        }
    }
}

impl Default for SteadyTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuousTimeSource for SteadyTimeSource {
    fn new_time(&self) -> Timestamp {
        let elapsed = self.origin.lock().elapsed();
        Timestamp::ZERO + Duration::from_std(elapsed)
    }

    fn reset_time(&self) -> Timestamp {
        *self.origin.lock() = Instant::now();
        Timestamp::ZERO
    }
}

/// Real system clock, the default main clock of a participant
pub type LocalSystemRealtimeClock = ContinuousClock<SteadyTimeSource>;

impl LocalSystemRealtimeClock {
    pub fn local() -> Self {
        ContinuousClock::new(LOCAL_SYSTEM_REALTIME, SteadyTimeSource::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventRecorder;
    use std::sync::Arc;
    use std::thread;
    use tempo_ports::{Clock, ClockType, EventSink};

    #[test]
    fn test_system_clock_advances() {
        let clock = LocalSystemRealtimeClock::local();
        let time1 = clock.now();
        thread::sleep(std::time::Duration::from_millis(10));
        let time2 = clock.now();

        assert!(time2 > time1);
        assert!(time2 - time1 >= Duration::from_millis(9));
    }

    #[test]
    fn test_start_rebases_to_zero() {
        let clock = LocalSystemRealtimeClock::local();
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(clock.now() >= Timestamp::from_millis(20));

        let recorder = Arc::new(EventRecorder::new());
        let sink: Arc<dyn EventSink> = recorder.clone();
        clock.start(Arc::downgrade(&sink)).unwrap();

        assert!(clock.now() < Timestamp::from_millis(20));
        assert_eq!(clock.name(), LOCAL_SYSTEM_REALTIME);
        assert_eq!(clock.clock_type(), ClockType::Continuous);
    }
}
