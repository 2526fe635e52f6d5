//! Common error type definitions.

use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Node functions report failures with this type; the runtime wraps it
/// together with the failing node's identity.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by shape-aware tensor and mask operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// Two shapes cannot be broadcast against each other.
    #[error("shapes {left:?} and {right:?} cannot be broadcast together")]
    Incompatible {
        /// Left-hand shape.
        left: Vec<usize>,
        /// Right-hand shape.
        right: Vec<usize>,
    },

    /// The shape's element count does not fit in `usize`.
    #[error("shape {shape:?} holds too many elements")]
    TooLarge {
        /// Declared shape.
        shape: Vec<usize>,
    },

    /// The element buffer does not match the declared shape.
    #[error("shape {shape:?} holds {expected} elements, got {actual}")]
    LengthMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of elements the shape implies.
        expected: usize,
        /// Number of elements supplied.
        actual: usize,
    },
}
