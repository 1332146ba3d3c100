//! Cooperative cancellation and time budgets.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{DrilldownError, Result};

/// Shared flag that cancels a running browse.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every browse holding a clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if the token is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Point in time after which partition work stops.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
    token: Option<CancellationToken>,
}

impl Deadline {
    /// Create a deadline `timeout` from now.
    pub fn new(timeout: Option<Duration>, token: Option<CancellationToken>) -> Self {
        Deadline {
            started: Instant::now(),
            timeout,
            token,
        }
    }

    /// A deadline that never expires.
    pub fn none() -> Self {
        Deadline::new(None, None)
    }

    /// Time since the deadline was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail with `Cancelled` or `Timeout` once the work should stop.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(DrilldownError::cancelled(what.to_string()));
        }
        if let Some(timeout) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > timeout {
                return Err(DrilldownError::timeout(format!(
                    "{what} exceeded {timeout:?} (ran {elapsed:?})"
                )));
            }
        }
        Ok(())
    }
}
