//! Core infrastructure shared by the cache node's resilience crates.
//!
//! This crate provides the event system used for observability across
//! `cache-circuitbreaker`, `cache-retry`, `cache-upstream` and `cache-replicator`:
//! a pattern instance emits a typed [`ResilienceEvent`] on every state change or
//! outcome, and any number of [`EventListener`]s can subscribe without the emitter
//! needing to know about logging, metrics, or test instrumentation.

pub mod events;

pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
