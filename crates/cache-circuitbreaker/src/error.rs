use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`crate::CircuitBreaker`]-wrapped service.
#[derive(Debug, Error, Clone)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without reaching the inner service.
    #[error("circuit '{name}' is open, retry after {retry_after:?}")]
    CircuitOpen {
        name: String,
        retry_after: Duration,
    },

    /// The inner service returned an error.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::CircuitOpen { .. } => None,
        }
    }
}
