use crate::job_config::{JobConfiguration, ViolationStrategy};
use crate::registry::TimingTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tempo_core::{Duration, Error, Result};

/// Timing of one job as written in the timing configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTiming {
    pub name: String,
    pub cycle_time_ns: i64,
    #[serde(default)]
    pub delay_ns: i64,
    /// Zero or absent means no runtime budget
    #[serde(default)]
    pub max_runtime_ns: Option<i64>,
    #[serde(default)]
    pub runtime_violation_strategy: ViolationStrategy,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl JobTiming {
    pub fn to_configuration(&self) -> JobConfiguration {
        JobConfiguration {
            cycle_time: Duration::from_nanos(self.cycle_time_ns),
            start_delay: Duration::from_nanos(self.delay_ns),
            max_runtime: self
                .max_runtime_ns
                .filter(|nanos| *nanos != 0)
                .map(Duration::from_nanos),
            violation_strategy: self.runtime_violation_strategy,
            depends_on: self.depends_on.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantTiming {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobTiming>,
}

/// System-wide job timing, one section per participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfiguration {
    #[serde(default)]
    pub participants: Vec<ParticipantTiming>,
}

impl TimingConfiguration {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidArg(format!("malformed timing configuration: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::NotFound(format!(
                "timing configuration '{}': {e}",
                path.display()
            ))
        })?;
        let configuration = Self::from_json(&text)?;
        log::info!(
            "loaded timing configuration '{}' ({} participant(s))",
            path.display(),
            configuration.participants.len()
        );
        Ok(configuration)
    }

    /// Job timing of one participant; empty when the participant is not listed
    pub fn table_for(&self, participant_name: &str) -> TimingTable {
        self.participants
            .iter()
            .filter(|participant| participant.name == participant_name)
            .flat_map(|participant| participant.jobs.iter())
            .map(|job| (job.name.clone(), job.to_configuration()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"{
        "participants": [
            { "name": "p1",
              "jobs": [
                { "name": "job_a", "cycle_time_ns": 100000000, "delay_ns": 0,
                  "max_runtime_ns": 10000000,
                  "runtime_violation_strategy": "warn_about_runtime_violation",
                  "depends_on": [] },
                { "name": "job_b", "cycle_time_ns": 50000000,
                  "depends_on": ["job_a"] }
              ] },
            { "name": "p2", "jobs": [] }
        ]
    }"#;

    #[test]
    fn test_table_for_participant() {
        let configuration = TimingConfiguration::from_json(FILE).unwrap();
        let table = configuration.table_for("p1");

        let names: Vec<_> = table.keys().cloned().collect();
        assert_eq!(names, vec!["job_a", "job_b"]);

        let a = &table["job_a"];
        assert_eq!(a.cycle_time, Duration::from_millis(100));
        assert_eq!(a.max_runtime, Some(Duration::from_millis(10)));
        assert_eq!(a.violation_strategy, ViolationStrategy::Warn);

        let b = &table["job_b"];
        assert_eq!(b.start_delay, Duration::ZERO);
        assert_eq!(b.max_runtime, None);
        assert_eq!(b.violation_strategy, ViolationStrategy::Ignore);
        assert_eq!(b.depends_on, vec!["job_a".to_string()]);
    }

    #[test]
    fn test_absent_participant_is_empty() {
        let configuration = TimingConfiguration::from_json(FILE).unwrap();
        assert!(configuration.table_for("p2").is_empty());
        assert!(configuration.table_for("nobody").is_empty());
    }

    #[test]
    fn test_malformed_and_missing_files() {
        assert!(matches!(
            TimingConfiguration::from_json("{ not json"),
            Err(Error::InvalidArg(_))
        ));
        assert!(matches!(
            TimingConfiguration::from_file("/nonexistent/timing.json"),
            Err(Error::NotFound(_))
        ));
    }
}
