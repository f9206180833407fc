use serde::{Deserialize, Serialize};
use tempo_clock::{LOCAL_SYSTEM_REALTIME, LocalSystemSimClock};
use tempo_core::{Duration, Result};
use tempo_ports::PropertyStore;

pub const PROPERTY_MAIN_CLOCK: &str = "clock/main_clock";
pub const PROPERTY_STEP_SIZE_NS: &str = "clock/step_size_ns";
pub const PROPERTY_TIME_FACTOR: &str = "clock/time_factor";

/// Clock service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockServiceConfig {
    /// Name of the clock that drives the participant
    pub main_clock: String,
    /// Simulated time per step of `local_system_simtime`
    pub step_size: Duration,
    /// Simulated time over wall time for `local_system_simtime`; 0 = unpaced
    pub time_factor: f64,
}

impl Default for ClockServiceConfig {
    fn default() -> Self {
        Self {
            main_clock: LOCAL_SYSTEM_REALTIME.to_string(),
            step_size: LocalSystemSimClock::DEFAULT_STEP_SIZE,
            time_factor: LocalSystemSimClock::DEFAULT_TIME_FACTOR,
        }
    }
}

impl ClockServiceConfig {
    pub fn from_properties(properties: &dyn PropertyStore) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            main_clock: properties.string_or(PROPERTY_MAIN_CLOCK, &defaults.main_clock),
            step_size: Duration::from_nanos(
                properties.i64_or(PROPERTY_STEP_SIZE_NS, defaults.step_size.as_nanos())?,
            ),
            time_factor: properties.f64_or(PROPERTY_TIME_FACTOR, defaults.time_factor)?,
        })
    }
}
