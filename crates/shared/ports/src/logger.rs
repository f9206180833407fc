use parking_lot::Mutex;
use tempo_core::Result;

/// Port for the participant logger
///
/// Every call reports whether the log itself succeeded. Callers ignore that
/// result: a failing logger never fails a job or the scheduler.
pub trait Logger: Send + Sync {
    fn log_warning(&self, message: &str) -> Result<()>;

    fn log_error(&self, message: &str) -> Result<()>;

    /// Errors that move the participant into its error state
    fn log_fatal(&self, message: &str) -> Result<()> {
        self.log_error(message)
    }
}

/// Logger forwarding to the `log` facade under a fixed target
#[derive(Debug, Clone)]
pub struct LogFacadeLogger {
    target: String,
}

impl LogFacadeLogger {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Default for LogFacadeLogger {
    fn default() -> Self {
        Self::new("tempo")
    }
}

impl Logger for LogFacadeLogger {
    fn log_warning(&self, message: &str) -> Result<()> {
        log::warn!(target: self.target.as_str(), "{message}");
        Ok(())
    }

    fn log_error(&self, message: &str) -> Result<()> {
        log::error!(target: self.target.as_str(), "{message}");
        Ok(())
    }

    fn log_fatal(&self, message: &str) -> Result<()> {
        log::error!(target: self.target.as_str(), "FATAL: {message}");
        Ok(())
    }
}

/// Severity of a captured log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warning,
    Error,
    Fatal,
}

/// Logger keeping every line in memory, for inspection after the fact
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Messages logged at `level`, oldest first
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) -> Result<()> {
        self.entries.lock().push((level, message.to_string()));
        Ok(())
    }
}

impl Logger for MemoryLogger {
    fn log_warning(&self, message: &str) -> Result<()> {
        self.push(LogLevel::Warning, message)
    }

    fn log_error(&self, message: &str) -> Result<()> {
        self.push(LogLevel::Error, message)
    }

    fn log_fatal(&self, message: &str) -> Result<()> {
        self.push(LogLevel::Fatal, message)
    }
}
