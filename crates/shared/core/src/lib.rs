//! Tempo Core Domain
//!
//! Pure value types for the Tempo co-simulation timing core.
//! This crate contains no I/O and no threads and is fully unit testable.
//!
//! - [`Timestamp`] / [`Duration`]: signed nanosecond logical time
//! - [`Error`]: the error taxonomy every component reports with
//! - [`Lifecycle`]: the running/stopped guard registries consult before mutating
//! - [`ErrorStateHandle`]: the one-shot escalation into participant error state

mod error;
mod error_state;
mod lifecycle;
pub mod values;

pub use error::{Error, Result};
pub use error_state::ErrorStateHandle;
pub use lifecycle::Lifecycle;
pub use values::{Duration, Timestamp};
