use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared running/stopped flag guarding build-time mutation
///
/// Registries consult one `Lifecycle` before every mutation instead of each
/// operation tracking the state itself. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    running: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Transition stopped -> running
    pub fn start(&self, component: &str) -> Result<()> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::InvalidState(format!("{component} is already running")))
    }

    /// Transition running -> stopped
    pub fn stop(&self, component: &str) -> Result<()> {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Error::InvalidState(format!("{component} is not running")))
    }

    /// Fail with `InvalidState` if `operation` would mutate a running component
    pub fn ensure_stopped(&self, operation: &str) -> Result<()> {
        if self.is_running() {
            Err(Error::InvalidState(format!(
                "{operation} is not allowed while running"
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.is_running());
        assert!(lifecycle.ensure_stopped("add").is_ok());

        lifecycle.start("registry").unwrap();
        assert!(lifecycle.is_running());
        assert!(matches!(
            lifecycle.ensure_stopped("add"),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            lifecycle.start("registry"),
            Err(Error::InvalidState(_))
        ));

        lifecycle.stop("registry").unwrap();
        assert!(matches!(
            lifecycle.stop("registry"),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let a = Lifecycle::new();
        let b = a.clone();
        a.start("service").unwrap();
        assert!(b.is_running());
    }
}
