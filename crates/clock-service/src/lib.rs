//! Tempo Clock Service
//!
//! Selects the participant's main clock, starts and stops it, and fans its
//! events out to every subscriber (timer scheduler, clock sync master).
//!
//! ```text
//! main clock ──► EventFanout ──┬──► TimerScheduler
//!                              └──► ClockSyncMaster
//! ```

pub mod config;
mod fanout;
mod service;

pub use config::ClockServiceConfig;
pub use fanout::{EventFanout, downgrade_sink};
pub use service::ClockService;
