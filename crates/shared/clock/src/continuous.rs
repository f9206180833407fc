use crate::clock_core::ClockCore;
use std::sync::Weak;
use tempo_core::{Result, Timestamp};
use tempo_ports::{Clock, ClockType, EventSink};

/// Where a continuous clock gets its time from
pub trait ContinuousTimeSource: Send + Sync {
    /// Sample the current time
    fn new_time(&self) -> Timestamp;

    /// Restart the source and return the time it restarts from
    fn reset_time(&self) -> Timestamp;
}

/// Clock whose time is derived by sampling a [`ContinuousTimeSource`]
///
/// Every `now()` samples the source. Forward movement is silent; the first
/// sample after `start` and any backward jump (e.g. a resynchronization) are
/// published as a reset pair.
pub struct ContinuousClock<S> {
    core: ClockCore,
    source: S,
}

impl<S: ContinuousTimeSource> ContinuousClock<S> {
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            core: ClockCore::new(name),
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_started(&self) -> bool {
        self.core.is_started()
    }

    /// Last time observed without sampling the source again
    pub fn last_time(&self) -> Timestamp {
        self.core.time()
    }
}

impl<S: ContinuousTimeSource> Clock for ContinuousClock<S> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn clock_type(&self) -> ClockType {
        ClockType::Continuous
    }

    fn now(&self) -> Timestamp {
        self.core.sample(|| self.source.new_time())
    }

    fn reset(&self) {
        let reset_time = self.source.reset_time();
        self.core.reset_to(reset_time);
    }

    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        self.core.start(sink, self.source.reset_time());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.core.unbind();
        Ok(())
    }
}
