//! Shared data model for the transit-status-cache node: the replicated
//! [`Snapshot`], its line/disruption records, the pending-waiter queue
//! entries the Replicator hands out, and the [`FetchError`] taxonomy that
//! flows through the upstream-client, circuit-breaker, and retry layers.

mod error;
mod snapshot;
mod waiter;

pub use error::FetchError;
pub use snapshot::{DisruptionRecord, LineRecord, Snapshot};
pub use waiter::{PendingWaiter, StatusReply};
