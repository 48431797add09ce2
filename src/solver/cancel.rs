//! Cooperative cancellation for long solves

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{SolverError, SolverResult};

/// Shared flag a caller can flip from another thread to stop a solve
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Checked by the backward pass before each period
#[derive(Debug, Clone)]
pub(crate) struct PeriodGuard {
    token: Option<CancellationToken>,
    deadline: Option<Duration>,
    started: Instant,
}

impl PeriodGuard {
    pub fn new(token: Option<CancellationToken>, deadline: Option<Duration>) -> Self {
        Self {
            token,
            deadline,
            started: Instant::now(),
        }
    }

    pub fn check(&self, period: usize) -> SolverResult<()> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(SolverError::Cancelled { period });
        }
        if let Some(deadline) = self.deadline {
            let elapsed = self.started.elapsed();
            if elapsed >= deadline {
                return Err(SolverError::DeadlineExceeded {
                    period,
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}
