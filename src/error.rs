//! Error types for sequence and batch-loading operations

use thiserror::Error;

/// Result type for sequence and batch-loading operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sequence and batch-loading operations
#[derive(Error, Debug)]
pub enum Error {
    /// Index out of bounds
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested position
        index: usize,
        /// Length of the indexed collection
        len: usize,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Paired collections must have equal lengths
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch {
        /// Length of the first collection
        left: usize,
        /// Length of the second collection
        right: usize,
    },

    /// Fold over zero elements
    #[error("Cannot reduce an empty sequence")]
    EmptyInput,

    /// A required capability was not provided at construction
    #[error("Missing capability: {0}")]
    MissingCapability(String),

    /// A worker pool failed while mapping a batch
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}
