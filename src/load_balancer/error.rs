//! Engine error types.

use thiserror::Error;

/// Errors returned by registry, strategy and engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A backend with this identifier is already registered.
    #[error("backend '{0}' is already registered")]
    DuplicateBackend(String),

    /// No backend with this identifier is registered.
    #[error("backend '{0}' not found")]
    BackendNotFound(String),

    /// The candidate list was empty at selection time.
    #[error("no backends available")]
    NoBackendsAvailable,

    /// The strategy name did not match any known strategy.
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    /// Connection accounting went out of balance (caller bug).
    #[error("invariant violated for backend '{id}': {reason}")]
    InvariantViolation { id: String, reason: String },

    /// Weights must be positive.
    #[error("invalid weight {weight} for backend '{id}': must be at least 1")]
    InvalidWeight { id: String, weight: u32 },

    /// Backend identifiers must be non-empty.
    #[error("backend identifier must not be empty")]
    InvalidBackendId,
}

impl EngineError {
    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::DuplicateBackend(_) => "duplicate_backend",
            EngineError::BackendNotFound(_) => "backend_not_found",
            EngineError::NoBackendsAvailable => "no_backends_available",
            EngineError::UnknownStrategy(_) => "unknown_strategy",
            EngineError::InvariantViolation { .. } => "invariant_violation",
            EngineError::InvalidWeight { .. } => "invalid_weight",
            EngineError::InvalidBackendId => "invalid_backend_id",
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
