use crate::error::Result;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type EscalationAction = dyn Fn(&str) -> Result<()> + Send + Sync;

/// One-shot handle that moves the participant into its error state
///
/// Components receive a clone at construction. The first `escalate` runs the
/// injected action; later calls (from any clone) are no-ops because the
/// participant is already in error state.
#[derive(Clone)]
pub struct ErrorStateHandle {
    inner: Arc<ErrorStateInner>,
}

struct ErrorStateInner {
    escalated: AtomicBool,
    reason: Mutex<Option<String>>,
    action: Box<EscalationAction>,
}

impl ErrorStateHandle {
    pub fn new(action: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ErrorStateInner {
                escalated: AtomicBool::new(false),
                reason: Mutex::new(None),
                action: Box::new(action),
            }),
        }
    }

    /// Handle whose escalation only latches the flag
    pub fn detached() -> Self {
        Self::new(|_| Ok(()))
    }

    /// Escalate to error state; only the first call runs the action
    pub fn escalate(&self, reason: &str) -> Result<()> {
        if self.inner.escalated.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        *self.inner.reason.lock() = Some(reason.to_string());
        (self.inner.action)(reason)
    }

    pub fn is_escalated(&self) -> bool {
        self.inner.escalated.load(Ordering::Acquire)
    }

    /// Reason given by the first escalation
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }
}

impl fmt::Debug for ErrorStateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorStateHandle")
            .field("escalated", &self.is_escalated())
            .finish()
    }
}
