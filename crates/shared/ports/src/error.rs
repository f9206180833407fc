use tempo_core::{Duration, Error};
use thiserror::Error;

/// Failure reported by an RPC transport
///
/// Timeouts are kept apart from the other transport failures so callers can
/// treat a slow peer differently from a broken one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("request to service '{service}' timed out after {timeout}")]
    Timeout { service: String, timeout: Duration },

    /// Peer or service unreachable, connection dropped
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything the transport did not expect (malformed reply, peer crashed mid-call)
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout { .. } => Error::Timeout(err.to_string()),
            RpcError::Transport(_) | RpcError::Unexpected(_) => Error::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_timeout() {
        let err = RpcError::Timeout {
            service: "clock_sync_slave".into(),
            timeout: Duration::from_millis(5),
        };
        assert!(matches!(Error::from(err), Error::Timeout(_)));
        assert!(matches!(
            Error::from(RpcError::Transport("gone".into())),
            Error::Failed(_)
        ));
    }
}
