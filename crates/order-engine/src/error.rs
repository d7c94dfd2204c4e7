//! Order engine error types.

use order_core::{CallKind, EngineFault, EventType};
use thiserror::Error;

/// Why a single attempt of a command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The engine refused the call synchronously.
    #[error("engine fault: {0}")]
    Fault(#[from] EngineFault),

    /// The engine accepted the call and later rejected it.
    #[error("rejected with {event_type}")]
    Rejected {
        /// The reject event that finished the attempt.
        event_type: EventType,
    },

    /// The order event stream shut down while waiting.
    #[error("order event stream closed")]
    StreamClosed,

    /// The executor no longer accepts calls.
    #[error("executor shut down")]
    ExecutorClosed,

    /// The engine call panicked on the worker thread.
    #[error("engine call panicked")]
    ExecutorPanicked,
}

impl AttemptError {
    /// Faults and rejects are retried; infrastructure failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fault(_) | Self::Rejected { .. })
    }
}

/// Terminal failure of a command after all attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call_kind} failed after {attempts} attempt(s): {cause}")]
pub struct CommandError {
    pub call_kind: CallKind,
    pub attempts: u32,
    #[source]
    pub cause: AttemptError,
}

/// Invalid command configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// Callback registered for an event type the call kind never sees.
    #[error("{event_type} is not an event type of {call_kind}")]
    ForeignEventType {
        call_kind: CallKind,
        event_type: EventType,
    },
}

/// Errors returned by the order facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("invalid command: {0}")]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Errors from operations on a whole position.
#[derive(Debug, Clone, Error)]
pub enum PositionTaskError {
    #[error("position merge on {instrument} failed: {source}")]
    Merge {
        instrument: String,
        #[source]
        source: TaskError,
    },

    #[error("{} of {total} closes on {instrument} failed", .errors.len())]
    Close {
        instrument: String,
        total: usize,
        errors: Vec<TaskError>,
    },
}
