use std::fmt;

use thiserror::Error;

/// Why a task submission was refused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RejectReason {
    /// The queue was at `queue_capacity` and had no room left.
    QueueFull,
    /// Acceptance has been switched off (via `stop_accepting`) or the executor is shut down.
    NotAccepting,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::QueueFull => write!(f, "task queue is full"),
            RejectReason::NotAccepting => write!(f, "executor is not accepting submissions"),
        }
    }
}

/// The executor's error taxonomy (see `SPEC_FULL.md` §7).
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("invalid executor configuration: {message}")]
    InvalidArgument { message: String },

    #[error("invalid executor state: {message}")]
    InvalidState { message: String },

    #[error("task rejected: {reason}")]
    Rejected { reason: RejectReason },

    #[error("wait was cancelled")]
    Cancelled,
}

impl ExecutorError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ExecutorError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ExecutorError::InvalidState {
            message: message.into(),
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        ExecutorError::Rejected { reason }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
