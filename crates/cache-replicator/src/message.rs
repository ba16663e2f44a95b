use cache_model::{FetchError, Snapshot, StatusReply};
use tokio::sync::oneshot;

/// Messages the Replicator's mailbox accepts. Handled one at a time by its
/// single consumer, so all mutation of `current`/`waiters`/`inflight_fetch`
/// is serialised without locks.
pub(crate) enum ReplicatorMessage {
    GetStatus {
        reply_to: oneshot::Sender<StatusReply>,
    },
    GetStatusWithFreshness {
        max_age_ms: Option<u64>,
        reply_to: oneshot::Sender<StatusReply>,
    },
    RefreshTick,
    FetchComplete {
        snapshot: Option<Snapshot>,
        error: Option<FetchError>,
    },
}
