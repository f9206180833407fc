//! Tempo Runner - Participant Wiring
//!
//! Builds one participant's timing core from its properties:
//!
//! - **Properties**: JSON-backed property store and typed participant config
//! - **Participant**: clock service, clock sync role, job registry, scheduler
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │   PropertyStore      │
//!                    │ (clock/, clock_sync/)│
//!                    └──────────┬───────────┘
//!                               │ ParticipantConfig
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         PARTICIPANT                             │
//! │                                                                 │
//! │  ┌──────────────────┐   events   ┌──────────────────┐          │
//! │  │  Clock Service   │ ─────────► │ Timer Scheduler  │          │
//! │  │  (main clock)    │            │ (JobTimer/job)   │          │
//! │  └────────┬─────────┘            └──────────────────┘          │
//! │           │ events (timing master only)                         │
//! │           ▼                                                     │
//! │  ┌──────────────────┐                                          │
//! │  │ Clock Sync Master│ ───── syncTimeEvent ─────► slaves        │
//! │  └──────────────────┘                                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A participant following a timing master registers the two slave clocks
//! instead and serves `clock_sync_slave` for the one selected as main clock.

pub mod config;
pub mod participant;
pub mod properties;

pub use config::{ConfigError, ParticipantConfig, PROPERTY_TIMING_CONFIGURATION};
pub use participant::Participant;
pub use properties::JsonPropertyStore;
