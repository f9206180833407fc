//! Tempo Scheduler
//!
//! Periodic job execution for a participant:
//! - [`JobRegistry`]: named jobs and their timing, frozen while running
//! - [`TimingConfiguration`]: system-wide job timing loaded from JSON
//! - [`JobRunner`]: runs one job's phases and enforces its runtime budget
//! - [`TimerScheduler`]: fires timers at their nominal ticks, synchronously
//!   for discrete time and on per-timer threads for continuous time

mod job_config;
mod registry;
mod runner;
mod scheduler;
mod timer;
mod timing_config;

pub use job_config::{JobConfiguration, ViolationStrategy};
pub use registry::{JobEntry, JobInfo, JobRegistry, Jobs, TimingTable};
pub use runner::JobRunner;
pub use scheduler::TimerScheduler;
pub use timer::{JobTimer, Timer};
pub use timing_config::{JobTiming, ParticipantTiming, TimingConfiguration};
