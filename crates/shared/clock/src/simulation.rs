use crate::discrete::DiscreteClock;
use crate::signal::StopSignal;
use crate::system::LOCAL_SYSTEM_SIMTIME;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tempo_core::{Duration, Error, Result, Timestamp};
use tempo_ports::{Clock, ClockType, EventSink};

/// Discrete clock stepped by its own thread
///
/// Every step advances simulated time by `step_size` and then waits
/// `step_size / time_factor` of wall time. A `time_factor` of `0.0` steps as
/// fast as possible. Deadlines are absolute, so slow sinks do not accumulate
/// drift against the wall clock.
pub struct LocalSystemSimClock {
    clock: Arc<DiscreteClock>,
    step_size: Duration,
    time_factor: f64,
    /// Wall time between steps; `None` when stepping as fast as possible
    period: Option<std::time::Duration>,
    stepper: Mutex<Option<Stepper>>,
}

struct Stepper {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

impl LocalSystemSimClock {
    pub const DEFAULT_STEP_SIZE: Duration = Duration::from_millis(100);
    pub const DEFAULT_TIME_FACTOR: f64 = 1.0;

    pub fn new(step_size: Duration, time_factor: f64) -> Result<Self> {
        if !step_size.is_positive() {
            return Err(Error::InvalidArg(format!(
                "step size must be positive, got {step_size}"
            )));
        }
        if !time_factor.is_finite() || time_factor < 0.0 {
            return Err(Error::InvalidArg(format!(
                "time factor must be a non-negative number, got {time_factor}"
            )));
        }

        let period = if time_factor > 0.0 {
            let seconds = step_size.to_std().as_secs_f64() / time_factor;
            let period = std::time::Duration::try_from_secs_f64(seconds).map_err(|_| {
                Error::InvalidArg(format!("time factor {time_factor} is too small"))
            })?;
            Some(period)
        } else {
            None
        };

        Ok(Self {
            clock: Arc::new(DiscreteClock::new(LOCAL_SYSTEM_SIMTIME)),
            step_size,
            time_factor,
            period,
            stepper: Mutex::new(None),
        })
    }

    pub fn step_size(&self) -> Duration {
        self.step_size
    }

    pub fn time_factor(&self) -> f64 {
        self.time_factor
    }

    pub fn is_stepping(&self) -> bool {
        self.stepper.lock().is_some()
    }

    fn run(
        clock: Arc<DiscreteClock>,
        signal: Arc<StopSignal>,
        step_size: Duration,
        period: Option<std::time::Duration>,
    ) {
        let mut time = Timestamp::ZERO;
        clock.set_new_time(time, true);

        let mut deadline = Instant::now();
        loop {
            match period {
                Some(period) => {
                    deadline += period;
                    if signal.wait_until(deadline) {
                        break;
                    }
                }
                None => {
                    if signal.is_stopped() {
                        break;
                    }
                    thread::yield_now();
                }
            }
            time += step_size;
            clock.set_new_time(time, true);
        }
        log::debug!(target: LOCAL_SYSTEM_SIMTIME, "stepper stopped at {time}");
    }
}

impl Default for LocalSystemSimClock {
    fn default() -> Self {
        Self {
            clock: Arc::new(DiscreteClock::new(LOCAL_SYSTEM_SIMTIME)),
            step_size: Self::DEFAULT_STEP_SIZE,
            time_factor: Self::DEFAULT_TIME_FACTOR,
            period: Some(Self::DEFAULT_STEP_SIZE.to_std()),
            stepper: Mutex::new(None),
        }
    }
}

impl Clock for LocalSystemSimClock {
    fn name(&self) -> &str {
        self.clock.name()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Discrete
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn reset(&self) {
        self.clock.reset();
    }

    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        let mut stepper = self.stepper.lock();
        if stepper.is_some() {
            return Err(Error::InvalidState(format!(
                "{LOCAL_SYSTEM_SIMTIME} is already started"
            )));
        }
        self.clock.start(sink)?;

        let signal = Arc::new(StopSignal::new());
        let clock = self.clock.clone();
        let thread_signal = signal.clone();
        let step_size = self.step_size;
        let period = self.period;
        let handle = thread::Builder::new()
            .name(LOCAL_SYSTEM_SIMTIME.to_string())
            .spawn(move || Self::run(clock, thread_signal, step_size, period))
            .map_err(|e| Error::Failed(format!("failed to spawn stepper thread: {e}")))?;

        log::info!(
            target: LOCAL_SYSTEM_SIMTIME,
            "started: step size {}, time factor {}",
            self.step_size,
            self.time_factor
        );
        *stepper = Some(Stepper { signal, handle });
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let stepper = self.stepper.lock().take();
        if let Some(Stepper { signal, handle }) = stepper {
            signal.stop();
            // A sink may stop the clock from inside a step
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::error!(target: LOCAL_SYSTEM_SIMTIME, "stepper thread panicked");
            }
        }
        self.clock.stop()
    }
}

impl Drop for LocalSystemSimClock {
    fn drop(&mut self) {
        if let Some(Stepper { signal, .. }) = self.stepper.get_mut().take() {
            signal.stop();
        }
    }
}
