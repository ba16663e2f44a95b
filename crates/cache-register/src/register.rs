use cache_model::{FetchError, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use metrics::counter;

/// Read consistency for `Get`. The lightweight gossip substrate here only
/// offers a non-blocking local read — `RefreshTick` uses exactly this, per
/// the Replicator's "local read (no quorum)" requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConsistency {
    Local,
}

/// Write consistency for `Update`. `Majority` blocks until a quorum of
/// peers ack the new value or `timeout` elapses.
#[derive(Debug, Clone, Copy)]
pub enum WriteConsistency {
    Majority(Duration),
}

/// Peer acks still needed for a majority write, given the local node's own
/// write already counts as one vote. For a cluster of `peer_count + 1`
/// nodes, majority is `(peer_count + 1) / 2 + 1`; subtracting the local
/// node's own vote leaves `(peer_count + 1) / 2` peer acks.
fn quorum_needed(peer_count: usize) -> usize {
    (peer_count + 1) / 2
}

fn merge_lww(current: Option<Snapshot>, candidate: Snapshot) -> Snapshot {
    match current {
        Some(cur) if cur >= candidate => cur,
        _ => candidate,
    }
}

/// A cluster-wide LWW register holding one [`Snapshot`] under a single
/// well-known key. Writes are tagged with `queried_by` (the source node's
/// cluster address) so LWW ties are well-defined; conflicts are resolved
/// by `(queried_at, queried_by)`, the same ordering `Snapshot` already
/// implements.
pub struct StatusRegister {
    value: RwLock<Option<Snapshot>>,
    http: reqwest::Client,
    peers: Vec<String>,
}

impl StatusRegister {
    pub fn new(peers: Vec<String>) -> Self {
        Self {
            value: RwLock::new(None),
            http: reqwest::Client::new(),
            peers,
        }
    }

    /// `Get(key, readLocal)` — returns the current value or `None`
    /// (NotFound). Non-blocking, may lag behind the cluster's true state.
    pub async fn get(&self, _consistency: ReadConsistency) -> Option<Snapshot> {
        self.value.read().await.clone()
    }

    /// `Update(key, initial, writeConsistency, modifyFn)` — runs `modify`
    /// against the current local value, merges the result with whatever is
    /// already present via LWW, stores it, then fans the merged value out
    /// to all peers concurrently. With `WriteConsistency::Majority(timeout)`
    /// this blocks until `⌈N/2⌉+1` peers ack or `timeout` elapses, per
    /// Design Note: "majority-write becomes await acks from ⌈N/2⌉+1 peers
    /// or timeout."
    pub async fn update(
        &self,
        consistency: WriteConsistency,
        modify: impl FnOnce(Option<Snapshot>) -> Snapshot,
    ) -> Result<(), FetchError> {
        let merged = {
            let mut guard = self.value.write().await;
            let candidate = modify(guard.clone());
            let merged = merge_lww(guard.take(), candidate);
            *guard = Some(merged.clone());
            merged
        };

        let WriteConsistency::Majority(timeout) = consistency;
        self.broadcast_and_await_quorum(merged, timeout).await
    }

    /// Applies an incoming peer broadcast via the same LWW merge rule as a
    /// local `Update`. Used by the node's `POST /internal/gossip` handler.
    pub async fn receive_gossip(&self, incoming: Snapshot) {
        let mut guard = self.value.write().await;
        let merged = merge_lww(guard.take(), incoming);
        *guard = Some(merged);
    }

    async fn broadcast_and_await_quorum(
        &self,
        value: Snapshot,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        if self.peers.is_empty() {
            return Ok(());
        }

        let needed = quorum_needed(self.peers.len());
        let acks = tokio::time::timeout(timeout, self.broadcast_once(&value)).await;

        match acks {
            Ok(acked) if acked >= needed => {
                #[cfg(feature = "metrics")]
                counter!("register_quorum_writes_total", "outcome" => "reached").increment(1);
                Ok(())
            }
            Ok(acked) => {
                #[cfg(feature = "tracing")]
                warn!(acked, needed, "majority write did not reach quorum in time");
                let _ = acked;
                #[cfg(feature = "metrics")]
                counter!("register_quorum_writes_total", "outcome" => "short").increment(1);
                Err(FetchError::UpdateTimeout)
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                warn!("majority write timed out waiting for peer acks");
                #[cfg(feature = "metrics")]
                counter!("register_quorum_writes_total", "outcome" => "timed_out").increment(1);
                Err(FetchError::UpdateTimeout)
            }
        }
    }

    async fn broadcast_once(&self, value: &Snapshot) -> usize {
        let requests = self.peers.iter().map(|peer| {
            let http = self.http.clone();
            let url = format!("{peer}/internal/gossip");
            let value = value.clone();
            async move {
                http.post(&url)
                    .json(&value)
                    .send()
                    .await
                    .map(|r| r.status().is_success())
                    .unwrap_or(false)
            }
        });

        let results = futures::future::join_all(requests).await;
        results.into_iter().filter(|ok| *ok).count()
    }

    /// Spawns the background periodic broadcast task: every `interval`,
    /// pushes the current local value to all peers without waiting for a
    /// quorum (failures are logged and left to the next tick — this is the
    /// "background gossip even when majority writes time out" convergence
    /// path, not a majority write itself).
    pub fn spawn_periodic_broadcast(
        self: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Some(value) = self.get(ReadConsistency::Local).await {
                    let acked = self.broadcast_once(&value).await;
                    #[cfg(feature = "tracing")]
                    debug!(acked, peers = self.peers.len(), "periodic gossip broadcast");
                    let _ = acked;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_model::Snapshot;
    use chrono::{TimeZone, Utc};

    fn snap(secs: i64, by: &str) -> Snapshot {
        Snapshot::new(vec![], Utc.timestamp_opt(secs, 0).unwrap(), by)
    }

    #[test]
    fn quorum_needed_is_majority_of_cluster_minus_self_vote() {
        // cluster size = peer_count + 1 (the local node already counts its
        // own write); quorum_needed is how many more peer acks are required.
        assert_eq!(quorum_needed(1), 1); // cluster of 2, majority 2, self=1, need 1 more
        assert_eq!(quorum_needed(2), 1); // cluster of 3, majority 2, self=1, need 1 more
        assert_eq!(quorum_needed(3), 2); // cluster of 4, majority 3, self=1, need 2 more
        assert_eq!(quorum_needed(4), 2); // cluster of 5, majority 3, self=1, need 2 more
    }

    #[test]
    fn merge_lww_keeps_newer() {
        let older = snap(100, "a");
        let newer = snap(200, "a");
        assert_eq!(merge_lww(Some(older.clone()), newer.clone()), newer);
        assert_eq!(merge_lww(Some(newer.clone()), older), newer);
    }

    #[test]
    fn merge_lww_with_no_current_takes_candidate() {
        let candidate = snap(100, "a");
        assert_eq!(merge_lww(None, candidate.clone()), candidate);
    }

    #[tokio::test]
    async fn get_returns_none_before_any_write() {
        let register = StatusRegister::new(vec![]);
        assert!(register.get(ReadConsistency::Local).await.is_none());
    }

    #[tokio::test]
    async fn update_with_no_peers_succeeds_immediately() {
        let register = StatusRegister::new(vec![]);
        let result = register
            .update(WriteConsistency::Majority(Duration::from_secs(2)), |_| {
                snap(100, "node-a")
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(
            register.get(ReadConsistency::Local).await,
            Some(snap(100, "node-a"))
        );
    }

    #[tokio::test]
    async fn receive_gossip_applies_lww() {
        let register = StatusRegister::new(vec![]);
        register.receive_gossip(snap(100, "node-a")).await;
        register.receive_gossip(snap(50, "node-b")).await;
        assert_eq!(
            register.get(ReadConsistency::Local).await,
            Some(snap(100, "node-a"))
        );
    }
}
