//! Error types for the mastering engine

use crate::job::{JobId, JobStatus};
use thiserror::Error;

/// Result type alias using `MasteringError`
pub type Result<T> = std::result::Result<T, MasteringError>;

/// Errors raised across the mastering pipeline
///
/// Parse and storage errors are absorbed: the workflow falls back to default
/// metrics or local delivery. Everything else that reaches a running job
/// fails it.
#[derive(Error, Debug)]
pub enum MasteringError {
    /// Settings are malformed or outside the accepted range
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The external DSP engine reported a failure
    #[error("Processing failed: {0}")]
    Execution(String),

    /// Diagnostic text did not contain the expected measurements
    #[error("Could not parse loudness report: {0}")]
    Parse(String),

    /// Remote artifact storage failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown job or source recording
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of thing that was looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// A job was asked to move to a state its lifecycle forbids
    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Job being transitioned
        id: JobId,
        /// Current status
        from: JobStatus,
        /// Requested status
        to: JobStatus,
    },

    /// Local disk failure while staging input or keeping a master
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasteringError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}
