//! The Replicator actor: owns a node's locally cached [`cache_model::Snapshot`],
//! schedules jittered periodic refreshes, coalesces concurrent stale reads
//! into a single upstream fetch, and answers freshness-bounded queries.

mod config;
mod message;
mod replicator;

pub use config::{ConfigError, ReplicatorConfig};
pub use replicator::{Replicator, ReplicatorHandle};
