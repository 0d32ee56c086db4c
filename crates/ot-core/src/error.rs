//! Error types for the operation algebra.

use thiserror::Error;

/// Result type used throughout `ot-core`.
pub type Result<T> = std::result::Result<T, OtError>;

/// Errors raised while constructing or applying [`crate::Operation`]s.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OtError {
    /// The operation's `base_length` did not match the input document's length.
    #[error("invalid base length: operation expects {expected} units, document has {actual}")]
    InvalidBaseLength { expected: usize, actual: usize },

    /// A `Retain` or `Delete` tried to consume more of the input than remained.
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    /// `compose(a, b)` was called with `a.target_length != b.base_length`.
    #[error("cannot compose: left target length {left_target} != right base length {right_base}")]
    ComposeLengthMismatch { left_target: usize, right_base: usize },

    /// `transform(a, b)` was called with `a.base_length != b.base_length`.
    #[error("cannot transform: base lengths differ ({left_base} != {right_base})")]
    TransformLengthMismatch { left_base: usize, right_base: usize },

    /// The JSON codec encountered a value that is not a Retain/Insert/Delete.
    #[error("invalid operation element: {0}")]
    InvalidCodecElement(String),
}
