use crate::config::ReplicatorConfig;
use crate::message::ReplicatorMessage;
use cache_model::{PendingWaiter, Snapshot, StatusReply};
use cache_register::{ReadConsistency, StatusRegister, WriteConsistency};
use cache_upstream::UpstreamGatewayHandle;
use chrono::Utc;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[cfg(feature = "metrics")]
use metrics::counter;

/// A cloneable handle to a running [`Replicator`] actor.
#[derive(Clone)]
pub struct ReplicatorHandle {
    tx: mpsc::Sender<ReplicatorMessage>,
}

impl ReplicatorHandle {
    /// `GetStatus(replyTo)` — never triggers a fetch.
    pub async fn get_status(&self) -> StatusReply {
        let (reply_to, rx) = oneshot::channel();
        if self
            .tx
            .send(ReplicatorMessage::GetStatus { reply_to })
            .await
            .is_err()
        {
            return StatusReply::fresh(None, None);
        }
        rx.await.unwrap_or_else(|_| StatusReply::fresh(None, None))
    }

    /// `GetStatusWithFreshness(maxAgeMs, replyTo)`.
    pub async fn get_status_with_freshness(&self, max_age_ms: Option<u64>) -> StatusReply {
        let (reply_to, rx) = oneshot::channel();
        let msg = ReplicatorMessage::GetStatusWithFreshness {
            max_age_ms,
            reply_to,
        };
        if self.tx.send(msg).await.is_err() {
            return StatusReply::fresh(None, max_age_ms);
        }
        rx.await
            .unwrap_or_else(|_| StatusReply::fresh(None, max_age_ms))
    }
}

/// Owns the local cached snapshot, the FIFO waiter queue, and the
/// in-flight-fetch flag — the Replicator's entire mutable state, touched
/// only from within its own mailbox loop.
pub struct Replicator {
    config: ReplicatorConfig,
    gateway: UpstreamGatewayHandle,
    register: Arc<StatusRegister>,
    self_tx: mpsc::Sender<ReplicatorMessage>,
    current: Option<Snapshot>,
    waiters: VecDeque<PendingWaiter>,
    inflight_fetch: bool,
}

impl Replicator {
    /// Spawns the Replicator's mailbox loop and its jittered periodic-tick
    /// task, and returns a handle for sending it messages.
    ///
    /// `config` must already satisfy `background_refresh_threshold <
    /// fresh_enough_threshold` — validate it with
    /// [`ReplicatorConfig::validate`] before calling this.
    pub fn spawn(
        config: ReplicatorConfig,
        gateway: UpstreamGatewayHandle,
        register: Arc<StatusRegister>,
        mailbox_capacity: usize,
    ) -> ReplicatorHandle {
        let (tx, rx) = mpsc::channel(mailbox_capacity);

        let refresh_interval = config.refresh_interval;
        let ticker_tx = tx.clone();
        tokio::spawn(async move {
            let jitter = Duration::from_millis(rand::rng().random_range(0..5_000));
            tokio::time::sleep(jitter).await;

            let mut ticker = tokio::time::interval(refresh_interval);
            loop {
                ticker.tick().await;
                if ticker_tx
                    .send(ReplicatorMessage::RefreshTick)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let actor = Replicator {
            config,
            gateway,
            register,
            self_tx: tx.clone(),
            current: None,
            waiters: VecDeque::new(),
            inflight_fetch: false,
        };
        tokio::spawn(actor.run(rx));

        ReplicatorHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ReplicatorMessage>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                ReplicatorMessage::GetStatus { reply_to } => {
                    reply_to.reply_status(StatusReply::fresh(self.current.clone(), None));
                }
                ReplicatorMessage::GetStatusWithFreshness {
                    max_age_ms,
                    reply_to,
                } => self.handle_get_with_freshness(max_age_ms, reply_to),
                ReplicatorMessage::RefreshTick => self.handle_refresh_tick().await,
                ReplicatorMessage::FetchComplete { snapshot, error } => {
                    self.handle_fetch_complete(snapshot, error).await
                }
            }
        }
    }

    fn handle_get_with_freshness(
        &mut self,
        max_age_ms: Option<u64>,
        reply_to: oneshot::Sender<StatusReply>,
    ) {
        let Some(max_age_ms) = max_age_ms else {
            reply_to.reply_status(StatusReply::fresh(self.current.clone(), None));
            return;
        };

        let Some(current) = self.current.clone() else {
            reply_to.reply_status(StatusReply::fresh(None, Some(max_age_ms)));
            return;
        };

        let age_ms = current.age_ms(Utc::now()) as u64;
        if age_ms <= max_age_ms {
            reply_to.reply_status(StatusReply::fresh(Some(current.clone()), Some(max_age_ms)));

            let background_threshold_ms = self.config.background_refresh_threshold.as_millis() as u64;
            if age_ms > background_threshold_ms {
                self.initiate_fetch();
            }
            return;
        }

        let waiter = PendingWaiter::new(Some(max_age_ms), reply_to);
        self.waiters.push_back(waiter);
        if self.waiters.len() == 1 {
            self.initiate_fetch();
        }
    }

    async fn handle_refresh_tick(&mut self) {
        match self.register.get(ReadConsistency::Local).await {
            Some(value) if value.is_fresh_enough(Utc::now(), self.config.fresh_enough_threshold) => {
                self.current = Some(value);
            }
            _ => self.initiate_fetch(),
        }
    }

    async fn handle_fetch_complete(
        &mut self,
        snapshot: Option<Snapshot>,
        error: Option<cache_model::FetchError>,
    ) {
        self.inflight_fetch = false;

        if let Some(err) = error {
            #[cfg(feature = "tracing")]
            warn!(node = %self.config.node_id, error = %err, "upstream fetch failed, serving stale cache");
            #[cfg(not(feature = "tracing"))]
            let _ = &err;

            #[cfg(feature = "metrics")]
            counter!("replicator_fetch_total", "outcome" => "failure").increment(1);

            let stale = self.current.clone();
            self.drain_waiters(move |max_age| StatusReply::stale(stale.clone(), max_age));
            return;
        }

        #[cfg(feature = "metrics")]
        counter!("replicator_fetch_total", "outcome" => "success").increment(1);

        let Some(snapshot) = snapshot else { return };
        self.current = Some(snapshot.clone());
        let fresh = self.current.clone();
        self.drain_waiters(move |max_age| StatusReply::fresh(fresh.clone(), max_age));

        let register = Arc::clone(&self.register);
        let node_id = self.config.node_id.clone();
        tokio::spawn(async move {
            let result = register
                .update(WriteConsistency::Majority(Duration::from_secs(2)), {
                    let snapshot = snapshot.clone();
                    move |_current| snapshot
                })
                .await;
            #[cfg(feature = "tracing")]
            if let Err(e) = result {
                warn!(node = %node_id, error = %e, "status register write did not reach quorum; relying on gossip");
            }
            #[cfg(not(feature = "tracing"))]
            let _ = (result, node_id);
        });
    }

    fn drain_waiters(&mut self, make_reply: impl Fn(Option<u64>) -> StatusReply) {
        while let Some(waiter) = self.waiters.pop_front() {
            let reply = make_reply(waiter.requested_max_age_ms);
            waiter.reply(reply);
        }
    }

    fn initiate_fetch(&mut self) {
        if self.inflight_fetch {
            #[cfg(feature = "metrics")]
            counter!("replicator_fetch_coalesced_total").increment(1);
            return;
        }
        self.inflight_fetch = true;

        #[cfg(feature = "tracing")]
        info!(node = %self.config.node_id, "initiating upstream fetch");

        let gateway = self.gateway.clone();
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let (snapshot, error) = match gateway.fetch_all().await {
                Ok(s) => (Some(s), None),
                Err(e) => (None, Some(e)),
            };
            let _ = tx.send(ReplicatorMessage::FetchComplete { snapshot, error }).await;
        });
    }
}

trait ReplyExt {
    fn reply_status(self, reply: StatusReply);
}

impl ReplyExt for oneshot::Sender<StatusReply> {
    fn reply_status(self, reply: StatusReply) {
        let _ = self.send(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_model::LineRecord;
    use cache_upstream::{UpstreamClient, UpstreamClientConfig, UpstreamGateway};

    fn test_config() -> ReplicatorConfig {
        ReplicatorConfig {
            node_id: "node-a".into(),
            refresh_interval: Duration::from_secs(3600),
            fresh_enough_threshold: Duration::from_secs(10),
            background_refresh_threshold: Duration::from_secs(5),
        }
    }

    fn spawn_test_replicator() -> ReplicatorHandle {
        let client = UpstreamClient::new(UpstreamClientConfig {
            base_url: "http://127.0.0.1:0".into(),
            node_id: "node-a".into(),
            ..Default::default()
        });
        let gateway = UpstreamGateway::spawn(client, 8);
        let register = Arc::new(StatusRegister::new(vec![]));
        Replicator::spawn(test_config(), gateway, register, 32)
    }

    #[tokio::test]
    async fn get_status_with_no_data_returns_none() {
        let handle = spawn_test_replicator();
        let reply = handle.get_status().await;
        assert!(reply.snapshot.is_none());
        assert!(!reply.is_stale);
        assert_eq!(reply.requested_max_age_ms, None);
    }

    #[tokio::test]
    async fn get_status_with_freshness_no_data_replies_not_stale() {
        let handle = spawn_test_replicator();
        let reply = handle.get_status_with_freshness(Some(5000)).await;
        assert!(reply.snapshot.is_none());
        assert!(!reply.is_stale);
        assert_eq!(reply.requested_max_age_ms, Some(5000));
    }

    #[test]
    fn line_record_is_constructible() {
        let _ = LineRecord {
            id: "district".into(),
            name: "District".into(),
            status: "Good Service".into(),
            disruptions: vec![],
        };
    }
}
