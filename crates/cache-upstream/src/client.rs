use crate::dto::LineResponseDto;
use cache_circuitbreaker::{CircuitBreaker, CircuitBreakerError, CircuitBreakerLayer, CircuitState};
use cache_model::{DisruptionRecord, FetchError, LineRecord, Snapshot};
use cache_retry::{Retry, RetryConfigBuilder};
use chrono::{NaiveDate, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};

#[cfg(feature = "tracing")]
use tracing::warn;

/// One of the two public fetches `UpstreamClient` exposes, addressed to the
/// innermost `doFetch` service.
#[derive(Debug, Clone)]
pub(crate) enum FetchRequest {
    All,
    LineRange {
        line_id: String,
        from: NaiveDate,
        to: NaiveDate,
    },
}

/// Configuration for an [`UpstreamClient`].
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub base_url: String,
    pub node_id: String,
    pub response_timeout: Duration,
    pub failure_threshold: u32,
    pub open_duration: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tfl.gov.uk".to_string(),
            node_id: "unknown-node".to_string(),
            response_timeout: Duration::from_secs(10),
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.1,
        }
    }
}

/// The innermost HTTP attempt: issues one GET, decodes the body, and
/// classifies the outcome per the bit-exact contract in the upstream fetch
/// protocol. Named (rather than a bare `service_fn` closure) so it can be
/// wrapped by `CircuitBreaker<DoFetch>` and stored as a field.
#[derive(Clone)]
struct DoFetch {
    http: reqwest::Client,
    base_url: Arc<str>,
    node_id: Arc<str>,
}

impl Service<FetchRequest> for DoFetch {
    type Response = Snapshot;
    type Error = FetchError;
    type Future = BoxFuture<'static, Result<Snapshot, FetchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: FetchRequest) -> Self::Future {
        let http = self.http.clone();
        let base_url = Arc::clone(&self.base_url);
        let node_id = Arc::clone(&self.node_id);
        Box::pin(async move { do_fetch(&http, &base_url, &node_id, req).await })
    }
}

fn url_for(base_url: &str, req: &FetchRequest) -> String {
    match req {
        FetchRequest::All => format!("{base_url}/Line/Mode/tube/Status"),
        FetchRequest::LineRange { line_id, from, to } => format!(
            "{base_url}/Line/{line_id}/Status/{}/to/{}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
        ),
    }
}

async fn do_fetch(
    http: &reqwest::Client,
    base_url: &str,
    node_id: &str,
    req: FetchRequest,
) -> Result<Snapshot, FetchError> {
    let url = url_for(base_url, &req);

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| FetchError::NetworkError(e.to_string()))?;

    let status = response.status();
    if status.as_u16() >= 400 {
        let code = status.as_u16();
        let retryable = code == 408 || code == 429 || code >= 500;
        // Drain the body so the connection can be reused, the content is discarded.
        let _ = response.bytes().await;

        #[cfg(feature = "tracing")]
        warn!(url = %url, status = code, retryable, "upstream returned error status");

        return Err(FetchError::HttpStatus { code, retryable });
    }

    let lines: Vec<LineResponseDto> = response
        .json()
        .await
        .map_err(|e| FetchError::DecodeError(e.to_string()))?;

    Ok(Snapshot::new(
        lines.into_iter().map(into_line_record).collect(),
        Utc::now(),
        node_id,
    ))
}

fn into_line_record(dto: LineResponseDto) -> LineRecord {
    let status = dto
        .line_statuses
        .first()
        .map(|s| s.status_severity_description.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    LineRecord {
        id: dto.id,
        name: dto.name,
        status,
        disruptions: dto
            .disruptions
            .into_iter()
            .map(|d| DisruptionRecord {
                is_planned: d.is_planned,
                description: d.description,
                affected_routes: d.affected_routes,
            })
            .collect(),
    }
}

/// Unwraps the one layer of circuit-breaker wrapping around the domain
/// error, per the "unwrap depth is exactly one" rule: a `CircuitOpen`
/// becomes the domain `FetchError::CircuitOpen`, and an inner error that
/// was still retryable when it surfaced can only mean the retry pass ran
/// out of attempts.
fn classify(err: CircuitBreakerError<FetchError>, max_retries: u32) -> FetchError {
    match err {
        CircuitBreakerError::CircuitOpen { name, retry_after } => {
            FetchError::CircuitOpen { name, retry_after }
        }
        CircuitBreakerError::Inner(fe) => {
            if fe.is_retryable() {
                FetchError::RetriesExhausted {
                    attempts: max_retries + 1,
                    cause: Box::new(fe),
                }
            } else {
                fe
            }
        }
    }
}

/// Issues HTTP GETs against the upstream transit-status API, decodes and
/// classifies responses, and wraps every call as `retry(circuitBreaker(doFetch()))`.
pub struct UpstreamClient {
    composed: Retry<CircuitBreaker<DoFetch>, CircuitBreakerError<FetchError>>,
    breaker: CircuitBreaker<DoFetch>,
    max_retries: u32,
}

impl UpstreamClient {
    pub fn new(config: UpstreamClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.response_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let do_fetch = DoFetch {
            http,
            base_url: Arc::from(config.base_url.as_str()),
            node_id: Arc::from(config.node_id.as_str()),
        };

        let breaker_layer = CircuitBreakerLayer::builder()
            .failure_threshold(config.failure_threshold)
            .open_duration(config.open_duration)
            .name("upstream")
            .build();
        let breaker = breaker_layer.layer(do_fetch);

        let retry_layer = RetryConfigBuilder::<CircuitBreakerError<FetchError>>::new()
            .max_retries(config.max_retries)
            .base_delay(config.base_delay)
            .max_delay(config.max_delay)
            .jitter_factor(config.jitter_factor)
            .retry_on(|err: &CircuitBreakerError<FetchError>| match err {
                CircuitBreakerError::CircuitOpen { .. } => false,
                CircuitBreakerError::Inner(fe) => fe.is_retryable(),
            })
            .name("upstream")
            .build();
        let composed = retry_layer.layer(breaker.clone());

        Self {
            composed,
            breaker,
            max_retries: config.max_retries,
        }
    }

    async fn fetch(&self, req: FetchRequest) -> Result<Snapshot, FetchError> {
        let mut svc = self.composed.clone();
        let ready = svc.ready().await.map_err(|e| classify(e, self.max_retries))?;
        ready
            .call(req)
            .await
            .map_err(|e| classify(e, self.max_retries))
    }

    /// `fetchAll()` — snapshot of all lines.
    pub async fn fetch_all(&self) -> Result<Snapshot, FetchError> {
        self.fetch(FetchRequest::All).await
    }

    /// `fetchLineRange(lineId, from, to)` — snapshot filtered to one line.
    pub async fn fetch_line_range(
        &self,
        line_id: impl Into<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Snapshot, FetchError> {
        self.fetch(FetchRequest::LineRange {
            line_id: line_id.into(),
            from,
            to,
        })
        .await
    }

    /// Current circuit-breaker state, for the `GetCircuitState` gateway
    /// message. Lazily transitions `OPEN -> HALF_OPEN` if `open_duration`
    /// has elapsed, per `getState()`'s contract.
    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.state().await
    }
}
