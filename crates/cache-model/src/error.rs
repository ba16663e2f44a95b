use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared across the upstream fetch path, the status
/// register, and the Replicator. Distinct from the generic middleware
/// errors in `cache-circuitbreaker`/`cache-retry` — this is the domain
/// error that `UpstreamClient` classifies HTTP/transport outcomes into,
/// and that `CircuitBreakerError<FetchError>`/`Retry<S, FetchError>`
/// carry as their `E`.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-layer failure: connection refused, reset, TLS error, read
    /// timeout. Always retryable.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A non-2xx HTTP response. `retryable` is set by the classification
    /// rule in `UpstreamClient` (408/429/5xx => true, other 4xx => false)
    /// and is honored verbatim by the retry predicate.
    #[error("upstream returned status {code}")]
    HttpStatus { code: u16, retryable: bool },

    /// The response body did not decode into the expected schema.
    /// Non-retryable.
    #[error("failed to decode upstream response: {0}")]
    DecodeError(String),

    /// The circuit is open; surfaced immediately, never retried within the
    /// same retry pass.
    #[error("circuit '{name}' is open, retry after {retry_after:?}")]
    CircuitOpen { name: String, retry_after: Duration },

    /// The retry policy exhausted its attempts; `cause` is the final
    /// underlying error.
    #[error("retries exhausted after {attempts} attempts: {cause}")]
    RetriesExhausted {
        attempts: u32,
        cause: Box<FetchError>,
    },

    /// A `StatusRegister` majority write did not collect a quorum of acks
    /// before its timeout. Non-fatal: the caller logs and continues,
    /// trusting gossip to eventually converge.
    #[error("status register update timed out")]
    UpdateTimeout,

    /// A read failed outright (not merely stale/not-found) — either a
    /// `StatusRegister` read, or a request that could not reach its owning
    /// actor because the mailbox was closed.
    #[error("read failed")]
    GetFailure,
}

impl FetchError {
    /// Default `isRetryable` classification: network errors and any
    /// `HttpStatus` tagged retryable are retried; decode errors, non-open
    /// circuits, and non-retryable statuses are not. `RetriesExhausted`,
    /// `UpdateTimeout`, and `GetFailure` are terminal states, not
    /// candidates for a further retry pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NetworkError(_) => true,
            FetchError::HttpStatus { retryable, .. } => *retryable,
            FetchError::DecodeError(_) => false,
            FetchError::CircuitOpen { .. } => false,
            FetchError::RetriesExhausted { .. } => false,
            FetchError::UpdateTimeout => false,
            FetchError::GetFailure => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, FetchError::CircuitOpen { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_retryable_status_are_retryable() {
        assert!(FetchError::NetworkError("reset".into()).is_retryable());
        assert!(FetchError::HttpStatus {
            code: 503,
            retryable: true
        }
        .is_retryable());
    }

    #[test]
    fn decode_and_non_retryable_status_are_not_retryable() {
        assert!(!FetchError::DecodeError("bad json".into()).is_retryable());
        assert!(!FetchError::HttpStatus {
            code: 404,
            retryable: false
        }
        .is_retryable());
    }

    #[test]
    fn circuit_open_is_terminal() {
        let err = FetchError::CircuitOpen {
            name: "upstream".into(),
            retry_after: Duration::from_secs(5),
        };
        assert!(!err.is_retryable());
        assert!(err.is_circuit_open());
    }
}
