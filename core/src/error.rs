//! Error types for the semantic kernel

use thiserror::Error;

/// Kernel error types
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("Duplicate qubit '{0}' in placement")]
    DuplicateQubit(String),

    #[error("Qubit '{0}' is not part of the register")]
    UnknownQubit(String),

    #[error("Matrix dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix dimension {0} is not a power of two")]
    NotAPowerOfTwo(usize),

    #[error("Placement width {placement} does not match matrix dimension {dim}")]
    PlacementWidth { placement: usize, dim: usize },

    #[error("Operators have different placements: [{0}] vs [{1}]")]
    PlacementMismatch(String, String),

    #[error("Empty operator list")]
    EmptyOperandList,

    #[error("Predicate '{0}' lies outside [0, I]")]
    NotAnEffect(String),

    #[error("SDP solver error: {0}")]
    Solver(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
