//! Error type shared by every rope, line index and snapshot operation.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RopeError {
    #[error("offset {offset} is outside the document (length {len})")]
    OutOfRange { offset: usize, len: usize },

    #[error("line {line} is out of bounds ({count} lines)")]
    LineOutOfRange { line: usize, count: usize },

    #[error("allocation failed while growing {what}")]
    AllocationFailure { what: &'static str },

    #[error("malformed snapshot at byte {position}: {reason}")]
    MalformedSnapshot { position: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RopeError {
    pub(crate) fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            position,
            reason: reason.into(),
        }
    }
}

impl From<std::collections::TryReserveError> for RopeError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::AllocationFailure { what: "buffer" }
    }
}

pub type Result<T> = std::result::Result<T, RopeError>;
