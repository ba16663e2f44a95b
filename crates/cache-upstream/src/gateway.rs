//! The single-consumer actor that owns the [`UpstreamClient`]: centralises
//! circuit-state visibility and localises upstream side effects so callers
//! (the Replicator) exchange only messages.

use crate::client::UpstreamClient;
use cache_circuitbreaker::CircuitState;
use cache_model::{FetchError, Snapshot};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "tracing")]
use tracing::warn;

#[cfg(feature = "metrics")]
use metrics::counter;

type FetchReply = oneshot::Sender<Result<Snapshot, FetchError>>;

/// Messages the gateway's mailbox accepts. Replies are correlated via their
/// own one-shot channel, not via message ordering — multiple in-flight
/// fetches are permitted and may complete out of order.
enum GatewayMessage {
    FetchAll {
        reply_to: FetchReply,
    },
    FetchLineRange {
        line_id: String,
        from: NaiveDate,
        to: NaiveDate,
        reply_to: FetchReply,
    },
    GetCircuitState {
        reply_to: oneshot::Sender<CircuitState>,
    },
}

/// A cloneable handle for sending messages to a running [`UpstreamGateway`].
#[derive(Clone)]
pub struct UpstreamGatewayHandle {
    tx: mpsc::Sender<GatewayMessage>,
}

impl UpstreamGatewayHandle {
    /// `FetchAll(replyTo)`.
    pub async fn fetch_all(&self) -> Result<Snapshot, FetchError> {
        let (reply_to, rx) = oneshot::channel();
        if self
            .tx
            .send(GatewayMessage::FetchAll { reply_to })
            .await
            .is_err()
        {
            return Err(FetchError::GetFailure);
        }
        rx.await.unwrap_or(Err(FetchError::GetFailure))
    }

    /// `FetchLineRange(lineId, from, to, replyTo)`.
    pub async fn fetch_line_range(
        &self,
        line_id: impl Into<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Snapshot, FetchError> {
        let (reply_to, rx) = oneshot::channel();
        let msg = GatewayMessage::FetchLineRange {
            line_id: line_id.into(),
            from,
            to,
            reply_to,
        };
        if self.tx.send(msg).await.is_err() {
            return Err(FetchError::GetFailure);
        }
        rx.await.unwrap_or(Err(FetchError::GetFailure))
    }

    /// `GetCircuitState(replyTo)`.
    pub async fn circuit_state(&self) -> CircuitState {
        let (reply_to, rx) = oneshot::channel();
        if self
            .tx
            .send(GatewayMessage::GetCircuitState { reply_to })
            .await
            .is_err()
        {
            return CircuitState::Closed;
        }
        rx.await.unwrap_or(CircuitState::Closed)
    }
}

/// Owns the `UpstreamClient` and serialises access to its mailbox. Each
/// message spawns a detached task so upstream latency never blocks the
/// mailbox from accepting the next request.
pub struct UpstreamGateway;

impl UpstreamGateway {
    /// Spawns the gateway's run loop on the current Tokio runtime and
    /// returns a handle for sending it messages. `mailbox_capacity` bounds
    /// the number of queued-but-not-yet-dispatched messages.
    pub fn spawn(client: UpstreamClient, mailbox_capacity: usize) -> UpstreamGatewayHandle {
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        tokio::spawn(Self::run(Arc::new(client), rx));
        UpstreamGatewayHandle { tx }
    }

    async fn run(client: Arc<UpstreamClient>, mut rx: mpsc::Receiver<GatewayMessage>) {
        while let Some(msg) = rx.recv().await {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                match msg {
                    GatewayMessage::FetchAll { reply_to } => {
                        let result = client.fetch_all().await;
                        #[cfg(feature = "tracing")]
                        if let Err(ref e) = result {
                            warn!(error = %e, "fetchAll failed");
                        }
                        #[cfg(feature = "metrics")]
                        counter!(
                            "upstream_fetch_total",
                            "operation" => "fetch_all",
                            "outcome" => if result.is_ok() { "success" } else { "failure" },
                        )
                        .increment(1);
                        let _ = reply_to.send(result);
                    }
                    GatewayMessage::FetchLineRange {
                        line_id,
                        from,
                        to,
                        reply_to,
                    } => {
                        let result = client.fetch_line_range(line_id, from, to).await;
                        #[cfg(feature = "tracing")]
                        if let Err(ref e) = result {
                            warn!(error = %e, "fetchLineRange failed");
                        }
                        #[cfg(feature = "metrics")]
                        counter!(
                            "upstream_fetch_total",
                            "operation" => "fetch_line_range",
                            "outcome" => if result.is_ok() { "success" } else { "failure" },
                        )
                        .increment(1);
                        let _ = reply_to.send(result);
                    }
                    GatewayMessage::GetCircuitState { reply_to } => {
                        let _ = reply_to.send(client.circuit_state().await);
                    }
                }
            });
        }
    }
}
