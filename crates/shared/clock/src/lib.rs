//! Tempo Clock Infrastructure
//!
//! Clocks of one participant and the registry that names them:
//!
//! ```text
//! ClockRegistry
//!     │
//!     ├── local_system_realtime  ContinuousClock<SteadyTimeSource>
//!     ├── local_system_simtime   LocalSystemSimClock (stepping thread)
//!     └── <registered>           e.g. clock-sync slave clocks
//! ```
//!
//! Both clock variants compose the same core: one lock around the time and
//! the weak sink, released before any sink callback so a sink may call back
//! into the clock.
//!
//! ## Usage
//!
//! ```ignore
//! use tempo_clock::{DiscreteClock, EventRecorder};
//!
//! let clock = DiscreteClock::new("stepped");
//! let recorder = Arc::new(EventRecorder::new());
//! let sink: Arc<dyn EventSink> = recorder.clone();
//! clock.start(Arc::downgrade(&sink))?;
//!
//! clock.set_new_time(Timestamp::from_millis(100), true); // reset 0 -> 100ms
//! clock.set_new_time(Timestamp::from_millis(200), true); // begin, updating, end
//! ```

mod clock_core;
mod continuous;
mod discrete;
mod recorder;
mod registry;
mod signal;
mod simulation;
mod system;

pub use continuous::{ContinuousClock, ContinuousTimeSource};
pub use discrete::DiscreteClock;
pub use recorder::{ClockEvent, EventRecorder};
pub use registry::ClockRegistry;
pub use signal::StopSignal;
pub use simulation::LocalSystemSimClock;
pub use system::{
    LOCAL_SYSTEM_REALTIME, LOCAL_SYSTEM_SIMTIME, LocalSystemRealtimeClock, SteadyTimeSource,
};

// Re-export the Clock trait for convenience
pub use tempo_ports::Clock;
