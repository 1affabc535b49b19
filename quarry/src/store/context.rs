use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deadline and cancellation state of one store round trip.
///
/// Drivers call [OperationContext::check] before and while they work. The
/// cancellation flag is shared with the owning connection, so cancelling
/// the connection also fails round trips that are already in flight.
#[derive(Clone, Debug)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl OperationContext {
    pub fn new(timeout: Option<Duration>, cancelled: Arc<AtomicBool>) -> Self {
        OperationContext {
            deadline: timeout.map(|t| Instant::now() + t),
            cancelled,
        }
    }

    /// A context without deadline that can never be cancelled.
    pub fn unbounded() -> Self {
        OperationContext {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fails with [ErrorKind::Cancelled] or [ErrorKind::Timeout] when the
    /// round trip must not continue.
    pub fn check(&self) -> QuarryResult<()> {
        if self.is_cancelled() {
            log::error!("Store operation cancelled");
            return Err(QuarryError::new(
                "Operation cancelled",
                ErrorKind::Cancelled,
            ));
        }

        if self.is_expired() {
            log::error!("Store operation timed out");
            return Err(QuarryError::new(
                "Operation timed out",
                ErrorKind::Timeout,
            ));
        }
        Ok(())
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        OperationContext::unbounded()
    }
}
