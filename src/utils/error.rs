// src/utils/error.rs

use thiserror::Error;

/// The primary error type for all operations in the map-buffer library.
///
/// Every failure is local to a single operation: the buffer is either fully
/// updated (success) or untouched (failure). No variant is ever retried
/// internally.
#[derive(Error, Debug)]
pub enum MapError {
    /// A caller violated a precondition: negative label, non-integer label
    /// channel, empty argument, unsorted input.
    #[error("invalid argument: {0}")]
    BadInput(String),

    /// Sizes overflow the pixel budget, a rectangle extends outside its
    /// matrix, element types do not match the accepted layout, or
    /// coordinate arithmetic overflows.
    #[error("bad shape: {0}")]
    BadShape(String),

    /// Occurs when a matrix channel count does not match the layout the
    /// buffer has already accepted.
    #[error("channel count mismatch: expected {expected}, but got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    /// Overlap violation under `disable_overlapping`, or a coverage
    /// requirement that does not hold.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A shifted label would exceed the 31-bit label range.
    #[error("label range exhausted: {0}")]
    Exhausted(String),

    /// Read on an empty buffer, missing last frame, or unknown registry id.
    #[error("not found: {0}")]
    NotFound(String),

    /// An internal assertion failed. Treated as a bug in this library.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized `Result` type for map-buffer operations.
pub type Result<T> = std::result::Result<T, MapError>;
