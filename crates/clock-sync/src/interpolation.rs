use parking_lot::Mutex;
use std::time::Instant;
use tempo_core::{Duration, Timestamp};

/// Local estimate of the master's time from sparse samples
///
/// Each sample is corrected by half the measured round trip. Between samples
/// the estimate advances with the local monotonic clock, and it never moves
/// backward until the next reset.
#[derive(Debug)]
pub struct InterpolationTime {
    state: Mutex<InterpolationState>,
}

#[derive(Debug)]
struct InterpolationState {
    /// `None` until the first sample or reset
    estimate: Option<Timestamp>,
    sampled_at: Instant,
    round_trip: Duration,
    is_reset: bool,
    /// Floor for `time()` since the last reset
    last_returned: Timestamp,
    /// Bumped by every reset
    generation: u64,
}

impl InterpolationTime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InterpolationState {
                estimate: None,
                sampled_at: Instant::now(),
                round_trip: Duration::ZERO,
                is_reset: false,
                last_returned: Timestamp::ZERO,
                generation: 0,
            }),
        }
    }

    /// Record a master sample that took `round_trip` to obtain
    pub fn set_time(&self, master_time: Timestamp, round_trip: Duration) {
        self.state.lock().apply(master_time, round_trip);
    }

    /// Record a sample requested at `generation`
    ///
    /// Returns `false` and drops the sample when a reset happened after the
    /// request was sent.
    pub fn set_time_since(
        &self,
        generation: u64,
        master_time: Timestamp,
        round_trip: Duration,
    ) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.apply(master_time, round_trip);
        true
    }

    /// Reset counter to capture before requesting a sample
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Jump to exactly `time`; held until the next sample
    pub fn reset_time(&self, time: Timestamp) {
        let mut state = self.state.lock();
        state.estimate = Some(time);
        state.sampled_at = Instant::now();
        state.is_reset = true;
        state.last_returned = time;
        state.generation = state.generation.wrapping_add(1);
    }

    pub fn time(&self) -> Timestamp {
        let mut state = self.state.lock();
        let Some(estimate) = state.estimate else {
            return Timestamp::ZERO;
        };
        if state.is_reset {
            return estimate;
        }

        let extrapolated = estimate + Duration::from_std(state.sampled_at.elapsed());
        let time = extrapolated.max(state.last_returned);
        state.last_returned = time;
        time
    }

    pub fn round_trip(&self) -> Duration {
        self.state.lock().round_trip
    }

    pub fn is_reset(&self) -> bool {
        self.state.lock().is_reset
    }
}

impl InterpolationState {
    fn apply(&mut self, master_time: Timestamp, round_trip: Duration) {
        self.estimate = Some(master_time + round_trip / 2);
        self.sampled_at = Instant::now();
        self.round_trip = round_trip;
        self.is_reset = false;
    }
}

impl Default for InterpolationTime {
    fn default() -> Self {
        Self::new()
    }
}
