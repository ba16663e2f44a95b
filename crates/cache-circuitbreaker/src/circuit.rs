use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The three states a circuit breaker can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Calls are allowed through; failures are being counted.
    Closed = 0,
    /// Calls are rejected immediately until `openDuration` elapses.
    Open = 1,
    /// A single probe call is permitted to test recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// The consecutive-failure-threshold state machine described by the circuit
/// breaker's transition table: `CLOSED` accumulates `consecutiveFailures`,
/// opens once they reach `N`, and reopens on any failed half-open probe.
///
/// `state_atomic` mirrors `state` so callers can read the circuit's state
/// without taking the lock that guards mutation (`CircuitBreaker::state_sync`).
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_probe_in_flight: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }
}

impl Circuit {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            consecutive_failures: 0,
            opened_at: None,
            half_open_probe_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Lazily moves `OPEN` to `HALF_OPEN` once `openDuration` has elapsed,
    /// without consuming the single probe slot. Used for introspection
    /// (`getState`/`GetCircuitState`) where no call is about to be made.
    pub fn observe_state(&mut self, config: &CircuitBreakerConfig) -> CircuitState {
        if self.state == CircuitState::Open {
            if let Some(opened_at) = self.opened_at {
                if Instant::now() >= opened_at + config.open_duration {
                    self.transition_to(CircuitState::HalfOpen, config);
                }
            }
        }
        self.state
    }

    /// Returns how much longer the circuit remains `OPEN`, or `None` if it
    /// is not currently open.
    pub fn remaining_open(&self, config: &CircuitBreakerConfig) -> Option<Duration> {
        match (self.state, self.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let deadline = opened_at + config.open_duration;
                Some(deadline.saturating_duration_since(Instant::now()))
            }
            _ => None,
        }
    }

    /// Checks whether a call may proceed right now, transitioning
    /// `OPEN -> HALF_OPEN` if the wait duration has elapsed. Returns
    /// `Err(remaining)` when the call must be rejected.
    pub fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Result<(), Duration> {
        match self.state {
            CircuitState::Closed => {
                self.emit_permitted(config);
                Ok(())
            }
            CircuitState::Open => {
                let opened_at = self.opened_at.expect("OPEN implies opened_at is set");
                let deadline = opened_at + config.open_duration;
                if Instant::now() >= deadline {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.half_open_probe_in_flight = true;
                    self.emit_permitted(config);
                    Ok(())
                } else {
                    self.emit_rejected(config);
                    Err(deadline.saturating_duration_since(Instant::now()))
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_probe_in_flight {
                    self.emit_rejected(config);
                    Err(Duration::ZERO)
                } else {
                    self.half_open_probe_in_flight = true;
                    self.emit_permitted(config);
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&mut self, config: &CircuitBreakerConfig) {
        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_probe_in_flight = false;
                self.transition_to(CircuitState::Closed, config);
            }
            _ => {
                self.consecutive_failures = 0;
            }
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);
    }

    pub fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_probe_in_flight = false;
                self.opened_at = Some(Instant::now());
                self.transition_to(CircuitState::Open, config);
            }
            CircuitState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= config.failure_threshold {
                    self.opened_at = Some(Instant::now());
                    self.transition_to(CircuitState::Open, config);
                }
            }
            CircuitState::Open => {}
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);
    }

    pub fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.opened_at = Some(Instant::now());
        self.transition_to(CircuitState::Open, config);
    }

    pub fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.reset(config);
    }

    pub fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.half_open_probe_in_flight = false;
        self.transition_to(CircuitState::Closed, config);
    }

    fn emit_permitted(&self, config: &CircuitBreakerConfig) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallPermitted {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }

    fn emit_rejected(&self, config: &CircuitBreakerConfig) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallRejected {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
            });
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }
        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %config.name, from = ?from_state, to = ?state, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => match from_state {
                    CircuitState::Closed => "closed",
                    CircuitState::Open => "open",
                    CircuitState::HalfOpen => "half_open",
                },
                "to" => match state {
                    CircuitState::Closed => "closed",
                    CircuitState::Open => "open",
                    CircuitState::HalfOpen => "half_open",
                }
            )
            .increment(1);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        if state == CircuitState::Closed {
            self.consecutive_failures = 0;
        }
    }
}
