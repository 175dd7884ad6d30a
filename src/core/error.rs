//! Error types delivered through deferred results.
//!
//! The purgatory never returns errors from its own operations. The only error
//! it produces is [`PurgatoryError::Timeout`], handed to a waiter through its
//! deferred result when the deadline passes first. [`PurgatoryError::Cancelled`]
//! is produced by a result's owner, never by the purgatory.

use crate::core::time::Tick;
use thiserror::Error;

/// Failure outcome of a deferred result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurgatoryError {
    /// The deadline elapsed before the result was completed.
    #[error("request timed out after {timeout_ms}ms (deadline {deadline})")]
    Timeout { timeout_ms: u64, deadline: Tick },

    /// The owner resolved the result before the purgatory did.
    #[error("request cancelled")]
    Cancelled,
}

impl PurgatoryError {
    /// Create a timeout error.
    pub fn timeout(timeout_ms: u64, deadline: Tick) -> Self {
        Self::Timeout {
            timeout_ms,
            deadline,
        }
    }

    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if the caller may reasonably retry the request.
    ///
    /// Retrying is always the caller's decision; nothing inside the crate
    /// retries.
    pub fn is_retriable(&self) -> bool {
        self.is_timeout()
    }
}

/// Result type using PurgatoryError.
pub type PurgatoryResult<T> = Result<T, PurgatoryError>;
