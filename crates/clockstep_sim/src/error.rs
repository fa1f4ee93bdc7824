//! Error types for the cycle driver.
//!
//! [`SimError`] is the single error returned by a run. It wraps the three
//! fatal categories: configuration problems found before reset begins,
//! trace resource failures, and faults reported by the model.

use std::io;
use std::path::PathBuf;

use clockstep_config::ConfigError;

use crate::time::VirtualTime;

/// A fault reported by a [`SignalInterface`](crate::SignalInterface) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ModelError {
    /// Description of the fault.
    pub message: String,
}

impl ModelError {
    /// Creates a model error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failures of the trace sink. None of these leave a usable trace behind.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The trace output could not be created.
    #[error("cannot open trace '{}': {source}", path.display())]
    Open {
        /// The output path.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Writing or flushing the trace failed.
    #[error("trace I/O error: {0}")]
    Io(#[from] io::Error),

    /// A capture was not strictly later than the previous one.
    #[error("trace timestamp {got} does not follow {previous}")]
    NonMonotonic {
        /// The last accepted timestamp.
        previous: VirtualTime,
        /// The rejected timestamp.
        got: VirtualTime,
    },

    /// The sink was used before `open` or after `close`.
    #[error("trace sink is not open")]
    NotOpen,
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The run configuration is invalid or does not fit the model.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The trace sink failed to open, write, or close.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The model reported a fault.
    #[error("model fault at cycle {cycle}: {source}")]
    Model {
        /// Run cycle during which the fault occurred.
        cycle: u64,
        /// The fault reported by the model.
        source: ModelError,
    },

    /// No built-in model has the requested kind.
    #[error("unknown model kind '{0}'")]
    UnknownModel(String),

    /// The clock sequencer was asked to step a cycle out of order.
    #[error("clock sequence violation: expected cycle {expected}, got {got}")]
    SequenceViolation {
        /// The cycle index that should have come next.
        expected: u64,
        /// The cycle index that was requested.
        got: u64,
    },

    /// Reset was released a second time.
    #[error("reset has already been released")]
    ResetReleased,
}

impl SimError {
    /// Wraps a model fault with the cycle it happened in.
    pub fn model(cycle: u64, source: ModelError) -> Self {
        SimError::Model { cycle, source }
    }
}
