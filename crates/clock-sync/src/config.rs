use serde::{Deserialize, Serialize};
use tempo_core::{Duration, Result};
use tempo_ports::PropertyStore;

pub const PROPERTY_TIMING_MASTER: &str = "clock_synchronization/timing_master";
pub const PROPERTY_SYNC_CYCLE_TIME_MS: &str = "clock_synchronization/sync_cycle_time_ms";
pub const PROPERTY_RPC_TIMEOUT_MS: &str = "clock_synchronization/rpc_timeout_ms";

/// Clock synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// Participant whose clock this one follows; `None` = no timing master
    pub timing_master: Option<String>,
    /// Polling period of the continuous slave clock
    pub sync_cycle_time: Duration,
    /// Timeout of every clock sync RPC
    pub rpc_timeout: Duration,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            timing_master: None,
            sync_cycle_time: Duration::from_millis(100),
            rpc_timeout: Duration::from_millis(1000),
        }
    }
}

impl ClockSyncConfig {
    pub fn from_properties(properties: &dyn PropertyStore) -> Result<Self> {
        let defaults = Self::default();
        let timing_master = properties
            .property(PROPERTY_TIMING_MASTER)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            timing_master,
            sync_cycle_time: Duration::from_millis(properties.i64_or(
                PROPERTY_SYNC_CYCLE_TIME_MS,
                defaults.sync_cycle_time.as_nanos() / 1_000_000,
            )?),
            rpc_timeout: Duration::from_millis(properties.i64_or(
                PROPERTY_RPC_TIMEOUT_MS,
                defaults.rpc_timeout.as_nanos() / 1_000_000,
            )?),
        })
    }

    /// Whether `participant_name` follows another participant's clock
    pub fn follows_master(&self, participant_name: &str) -> bool {
        self.timing_master
            .as_deref()
            .is_some_and(|master| master != participant_name)
    }
}
