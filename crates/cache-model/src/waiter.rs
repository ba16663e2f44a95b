use crate::Snapshot;
use tokio::sync::oneshot;

/// Reply delivered to a caller of `GetStatus`/`GetStatusWithFreshness`: the
/// current snapshot (if any), whether it is being served stale, and the
/// `maxAgeMs` the caller asked for (echoed back, `None` for plain `GetStatus`).
#[derive(Debug, Clone)]
pub struct StatusReply {
    pub snapshot: Option<Snapshot>,
    pub is_stale: bool,
    pub requested_max_age_ms: Option<u64>,
}

impl StatusReply {
    pub fn fresh(snapshot: Option<Snapshot>, requested_max_age_ms: Option<u64>) -> Self {
        Self {
            snapshot,
            is_stale: false,
            requested_max_age_ms,
        }
    }

    pub fn stale(snapshot: Option<Snapshot>, requested_max_age_ms: Option<u64>) -> Self {
        Self {
            snapshot,
            is_stale: true,
            requested_max_age_ms,
        }
    }
}

/// A caller blocked on the Replicator awaiting completion of an in-flight
/// upstream fetch. Owned exclusively by the Replicator that enqueued it;
/// never shared across nodes. FIFO within a node, dropped (without being
/// answered again) once `FetchComplete` fires.
#[derive(Debug)]
pub struct PendingWaiter {
    pub requested_max_age_ms: Option<u64>,
    pub reply_to: oneshot::Sender<StatusReply>,
}

impl PendingWaiter {
    pub fn new(requested_max_age_ms: Option<u64>, reply_to: oneshot::Sender<StatusReply>) -> Self {
        Self {
            requested_max_age_ms,
            reply_to,
        }
    }

    /// Sends the reply. A closed receiver (caller gave up, e.g. an HTTP-layer
    /// timeout) is a silent no-op — stale/orphaned reply channels are
    /// expected and absorbed per the cancellation contract.
    pub fn reply(self, reply: StatusReply) {
        let _ = self.reply_to.send(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_to_dropped_receiver_is_a_no_op() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        let waiter = PendingWaiter::new(Some(5000), tx);
        waiter.reply(StatusReply::stale(None, Some(5000)));
    }

    #[tokio::test]
    async fn reply_delivers_to_receiver() {
        let (tx, rx) = oneshot::channel();
        let waiter = PendingWaiter::new(Some(1000), tx);
        waiter.reply(StatusReply::fresh(None, Some(1000)));
        let reply = rx.await.unwrap();
        assert!(!reply.is_stale);
        assert_eq!(reply.requested_max_age_ms, Some(1000));
    }
}
