use std::path::PathBuf;
use tempo_clock_service::ClockServiceConfig;
use tempo_clock_sync::ClockSyncConfig;
use tempo_ports::PropertyStore;
use thiserror::Error;

pub const PROPERTY_TIMING_CONFIGURATION: &str = "job_registry/timing_configuration";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config root must be a JSON object")]
    NotAnObject,
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] tempo_core::Error),
}

/// Everything a participant reads from its properties
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantConfig {
    pub name: String,
    pub clock: ClockServiceConfig,
    pub sync: ClockSyncConfig,
    /// Timing configuration file applied to the job registry
    pub timing_configuration: Option<PathBuf>,
}

impl ParticipantConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clock: ClockServiceConfig::default(),
            sync: ClockSyncConfig::default(),
            timing_configuration: None,
        }
    }

    pub fn from_properties(
        name: impl Into<String>,
        properties: &dyn PropertyStore,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            clock: ClockServiceConfig::from_properties(properties)?,
            sync: ClockSyncConfig::from_properties(properties)?,
            timing_configuration: properties
                .property(PROPERTY_TIMING_CONFIGURATION)
                .map(|path| path.trim().to_string())
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Whether this participant drives its own time
    pub fn is_timing_master(&self) -> bool {
        !self.sync.follows_master(&self.name)
    }
}
