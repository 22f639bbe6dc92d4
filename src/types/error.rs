//! Engine error taxonomy

use thiserror::Error;

/// Errors raised by the core computation engine.
///
/// Every variant carries a message suitable for direct display to a user.
/// Operations that fail leave their target unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed numeric input (zero x-interval, length mismatch, empty input).
    #[error("Numeric error: {0}")]
    Numeric(String),

    /// A fit or root search exhausted its iteration budget or found no solution.
    #[error("Convergence error: {0}")]
    Convergence(String),

    /// Composition rules for an assembled function were violated.
    #[error("Assemble error: {0}")]
    Assemble(String),

    /// A value or scaling would leave its physical bounds.
    #[error("Limit error: {0}")]
    Limit(String),

    /// The operation is not offered by this model family.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// `get(id)` was called with a key outside the series catalogue.
    #[error("Unknown series: {0}")]
    UnknownSeries(String),

    /// An entity id that does not belong to the tree it was used with.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

impl EngineError {
    pub(crate) fn numeric(msg: impl Into<String>) -> Self {
        Self::Numeric(msg.into())
    }

    pub(crate) fn convergence(msg: impl Into<String>) -> Self {
        Self::Convergence(msg.into())
    }

    pub(crate) fn assemble(msg: impl Into<String>) -> Self {
        Self::Assemble(msg.into())
    }

    pub(crate) fn limit(msg: impl Into<String>) -> Self {
        Self::Limit(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
