use serde::{Deserialize, Serialize};
use std::fmt;
use tempo_core::{Duration, Error, Result};

/// What the job runner does when a job exceeds its runtime budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationStrategy {
    #[default]
    Ignore,
    /// Log a warning with the measured runtime
    Warn,
    /// Log an error and do not publish this cycle's output
    SkipOutput,
    /// Escalate to error state and cancel the job for good
    SetErrorState,
    /// Unrecognized configuration value; treated like `Ignore`
    Unknown,
}

impl ViolationStrategy {
    /// Accepts both the short and the long configuration spellings
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "ignore" | "ignore_runtime_violation" => ViolationStrategy::Ignore,
            "warn" | "warn_about_runtime_violation" => ViolationStrategy::Warn,
            "skip_output" | "skip_output_publish" => ViolationStrategy::SkipOutput,
            "set_error_state" | "set_stm_to_error" => ViolationStrategy::SetErrorState,
            _ => ViolationStrategy::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationStrategy::Ignore => "ignore",
            ViolationStrategy::Warn => "warn",
            ViolationStrategy::SkipOutput => "skip_output",
            ViolationStrategy::SetErrorState => "set_error_state",
            ViolationStrategy::Unknown => "unknown",
        }
    }
}

impl From<String> for ViolationStrategy {
    fn from(text: String) -> Self {
        ViolationStrategy::parse(&text)
    }
}

impl From<ViolationStrategy> for String {
    fn from(strategy: ViolationStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl fmt::Display for ViolationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfiguration {
    pub cycle_time: Duration,
    pub start_delay: Duration,
    pub max_runtime: Option<Duration>,
    pub violation_strategy: ViolationStrategy,
    /// Names of the jobs this one consumes the output of; informational
    pub depends_on: Vec<String>,
}

impl JobConfiguration {
    pub fn new(cycle_time: Duration) -> Self {
        Self {
            cycle_time,
            start_delay: Duration::ZERO,
            max_runtime: None,
            violation_strategy: ViolationStrategy::default(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    pub fn with_max_runtime(mut self, max_runtime: Duration, strategy: ViolationStrategy) -> Self {
        self.max_runtime = Some(max_runtime);
        self.violation_strategy = strategy;
        self
    }

    pub fn with_dependencies<I, S>(mut self, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = depends_on.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cycle_time.is_positive() {
            return Err(Error::InvalidArg(format!(
                "cycle time must be positive, got {}",
                self.cycle_time
            )));
        }
        if self.start_delay.is_negative() {
            return Err(Error::InvalidArg(format!(
                "start delay must not be negative, got {}",
                self.start_delay
            )));
        }
        if let Some(max_runtime) = self.max_runtime {
            if !max_runtime.is_positive() {
                return Err(Error::InvalidArg(format!(
                    "max runtime must be positive, got {max_runtime}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_spellings() {
        assert_eq!(ViolationStrategy::parse("warn"), ViolationStrategy::Warn);
        assert_eq!(
            ViolationStrategy::parse("warn_about_runtime_violation"),
            ViolationStrategy::Warn
        );
        assert_eq!(
            ViolationStrategy::parse("skip_output_publish"),
            ViolationStrategy::SkipOutput
        );
        assert_eq!(
            ViolationStrategy::parse("set_stm_to_error"),
            ViolationStrategy::SetErrorState
        );
        assert_eq!(
            ViolationStrategy::parse("ignore_runtime_violation"),
            ViolationStrategy::Ignore
        );
        assert_eq!(ViolationStrategy::parse("panic"), ViolationStrategy::Unknown);
    }

    #[test]
    fn test_strategy_serde_uses_short_names() {
        let json = serde_json::to_string(&ViolationStrategy::SkipOutput).unwrap();
        assert_eq!(json, r#""skip_output""#);
        let parsed: ViolationStrategy = serde_json::from_str(r#""set_stm_to_error""#).unwrap();
        assert_eq!(parsed, ViolationStrategy::SetErrorState);
    }

    #[test]
    fn test_builder_and_validation() {
        let config = JobConfiguration::new(Duration::from_millis(100))
            .with_delay(Duration::from_millis(10))
            .with_max_runtime(Duration::from_millis(5), ViolationStrategy::Warn)
            .with_dependencies(["sensor"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.depends_on, vec!["sensor".to_string()]);

        let zero_cycle = JobConfiguration::new(Duration::ZERO);
        assert!(matches!(zero_cycle.validate(), Err(Error::InvalidArg(_))));

        let negative_delay =
            JobConfiguration::new(Duration::from_millis(1)).with_delay(Duration::from_millis(-1));
        assert!(matches!(negative_delay.validate(), Err(Error::InvalidArg(_))));

        let zero_budget = JobConfiguration::new(Duration::from_millis(1))
            .with_max_runtime(Duration::ZERO, ViolationStrategy::Warn);
        assert!(matches!(zero_budget.validate(), Err(Error::InvalidArg(_))));
    }
}
