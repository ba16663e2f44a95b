//! Circuit breaker pattern for Tower services.
//!
//! A circuit breaker prevents cascading failures by tracking consecutive
//! failures on a service and temporarily rejecting calls once too many have
//! happened in a row.
//!
//! ## States
//! - **Closed**: normal operation, calls pass through and failures are counted
//! - **Open**: calls are rejected immediately until `open_duration` elapses
//! - **Half-Open**: a single probe call is allowed through to test recovery
//!
//! ## Basic Example
//!
//! ```rust
//! use cache_circuitbreaker::CircuitBreakerLayer;
//! use tower::{Layer, service_fn};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::builder()
//!     .failure_threshold(5)
//!     .open_duration(Duration::from_secs(30))
//!     .build();
//!
//! let svc = service_fn(|req: String| async move {
//!     Ok::<String, ()>(req)
//! });
//! let mut service = layer.layer(svc);
//! # let _ = &mut service;
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use cache_circuitbreaker::{CircuitBreakerLayer, CircuitBreakerError};
//! use tower::{Layer, Service, service_fn};
//!
//! # async fn example() {
//! let layer = CircuitBreakerLayer::builder().build();
//! let mut service = layer.layer(service_fn(|req: String| async move {
//!     Ok::<_, ()>(req)
//! }));
//!
//! match service.call("request".to_string()).await {
//!     Ok(response) => println!("Success: {}", response),
//!     Err(CircuitBreakerError::CircuitOpen { name, retry_after }) => {
//!         eprintln!("circuit '{name}' open, retry after {retry_after:?}");
//!     }
//!     Err(CircuitBreakerError::Inner(e)) => {
//!         eprintln!("Service error: {:?}", e);
//!     }
//! }
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging and tracing using the `tracing` crate

use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tower::Service;

use crate::circuit::Circuit;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

mod circuit;
mod config;
mod error;
mod events;
mod layer;

/// A Tower [`Service`] that applies circuit breaker logic to an inner service.
///
/// State is shared behind a lock-free atomic for reads (`state_sync`) and a
/// `tokio::Mutex` for the mutating paths (`try_acquire`/`record_*`), matching
/// the requirement that reads never block while state changes remain atomic
/// under concurrent callers.
pub struct CircuitBreaker<S> {
    inner: S,
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<std::sync::atomic::AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl<S> CircuitBreaker<S> {
    pub(crate) fn new(inner: S, config: Arc<CircuitBreakerConfig>) -> Self {
        let state_atomic = Arc::new(std::sync::atomic::AtomicU8::new(CircuitState::Closed as u8));
        Self {
            inner,
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
            config,
        }
    }

    /// Forces the circuit into the open state.
    pub async fn force_open(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_open(&self.config);
    }

    /// Forces the circuit into the closed state, clearing the failure count.
    pub async fn force_closed(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_closed(&self.config);
    }

    /// Resets the circuit to the closed state and clears the failure count.
    pub async fn reset(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.reset(&self.config);
    }

    /// Returns the current state, lazily transitioning `OPEN -> HALF_OPEN`
    /// if `open_duration` has elapsed. This is `getState()` from the
    /// transition table.
    pub async fn state(&self) -> CircuitState {
        let mut circuit = self.circuit.lock().await;
        circuit.observe_state(&self.config)
    }

    /// Returns the circuit's state without taking the lock. May be briefly
    /// stale relative to an in-flight `OPEN -> HALF_OPEN` transition, but
    /// never blocks - safe to call from a hot path or a health check.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(std::sync::atomic::Ordering::Acquire))
    }
}

impl<S: Clone> Clone for CircuitBreaker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            circuit: Arc::clone(&self.circuit),
            state_atomic: Arc::clone(&self.state_atomic),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req> Service<Req> for CircuitBreaker<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let circuit = Arc::clone(&self.circuit);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let permit = {
                let mut circuit = circuit.lock().await;
                circuit.try_acquire(&config)
            };

            if let Err(retry_after) = permit {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %config.name, "circuit open, call rejected");

                return Err(CircuitBreakerError::CircuitOpen {
                    name: config.name.clone(),
                    retry_after,
                });
            }

            let result = inner.call(req).await;

            let mut circuit = circuit.lock().await;
            if result.is_err() {
                circuit.record_failure(&config);
            } else {
                circuit.record_success(&config);
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
