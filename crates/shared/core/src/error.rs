//! Error taxonomy shared by every Tempo component

use thiserror::Error;

/// Errors surfaced by clocks, registries, the scheduler and clock sync
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Duplicate/unknown name or malformed configuration
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Mutation attempted while running, or a lifecycle step out of order
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate registration
    #[error("resource in use: {0}")]
    ResourceInUse(String),

    /// Job runner latched after a fatal runtime violation
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("failed: {0}")]
    Failed(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Stable numeric status used on the RPC wire (`0` means success)
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArg(_) => 1,
            Error::InvalidState(_) => 2,
            Error::NotFound(_) => 3,
            Error::ResourceInUse(_) => 4,
            Error::Cancelled(_) => 5,
            Error::Failed(_) => 6,
            Error::Timeout(_) => 7,
        }
    }

    /// Rebuild an error from its wire status; unknown codes map to `Failed`
    pub fn from_code(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            1 => Error::InvalidArg(message),
            2 => Error::InvalidState(message),
            3 => Error::NotFound(message),
            4 => Error::ResourceInUse(message),
            5 => Error::Cancelled(message),
            7 => Error::Timeout(message),
            _ => Error::Failed(message),
        }
    }

    /// The human-readable description without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidArg(m)
            | Error::InvalidState(m)
            | Error::NotFound(m)
            | Error::ResourceInUse(m)
            | Error::Cancelled(m)
            | Error::Failed(m)
            | Error::Timeout(m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_keeps_kind() {
        let errors = [
            Error::InvalidArg("a".into()),
            Error::InvalidState("b".into()),
            Error::NotFound("c".into()),
            Error::ResourceInUse("d".into()),
            Error::Cancelled("e".into()),
            Error::Failed("f".into()),
            Error::Timeout("g".into()),
        ];
        for error in errors {
            assert_eq!(Error::from_code(error.code(), error.message()), error);
        }
    }

    #[test]
    fn test_unknown_code_is_failed() {
        assert_eq!(Error::from_code(99, "boom"), Error::Failed("boom".into()));
    }

    #[test]
    fn test_display_includes_message() {
        let error = Error::NotFound("job 'x'".into());
        assert_eq!(error.to_string(), "not found: job 'x'");
    }
}
