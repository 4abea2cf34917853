use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::{RuntimeError, RuntimeResult};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 200;

/// Shared flag another thread can set to stop a running script at its next
/// checkpoint.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits applied to one script run.
#[derive(Debug, Clone)]
pub struct ExecutionBudget {
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
    /// Output beyond this many bytes is dropped and marked once.
    pub max_output_bytes: Option<usize>,
    pub cancel: CancelFlag,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            timeout: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_output_bytes: None,
            cancel: CancelFlag::new(),
        }
    }
}

impl ExecutionBudget {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = Some(bytes);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn start(&self) -> Deadline {
        Deadline {
            at: self.timeout.map(|t| Instant::now() + t),
            limit: self.timeout,
            cancel: self.cancel.clone(),
        }
    }
}

/// The running form of a budget: an absolute deadline plus the cancel flag.
#[derive(Debug, Clone)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    limit: Option<Duration>,
    cancel: CancelFlag,
}

impl Deadline {
    pub(crate) fn check(&self) -> RuntimeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        match (self.at, self.limit) {
            (Some(at), Some(limit)) if Instant::now() >= at => Err(RuntimeError::Timeout {
                limit_ms: limit.as_millis(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_trips_checkpoint() {
        let budget = ExecutionBudget::default();
        let deadline = budget.start();
        assert!(deadline.check().is_ok());
        budget.cancel.cancel();
        assert_eq!(deadline.check(), Err(RuntimeError::Cancelled));
    }

    #[test]
    fn test_elapsed_deadline() {
        let deadline = ExecutionBudget::default()
            .with_timeout(Duration::from_millis(0))
            .start();
        assert!(matches!(deadline.check(), Err(RuntimeError::Timeout { limit_ms: 0 })));
    }
}
