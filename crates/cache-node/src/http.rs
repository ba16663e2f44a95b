use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cache_model::Snapshot;
use cache_register::StatusRegister;
use cache_replicator::ReplicatorHandle;
use cache_upstream::UpstreamGatewayHandle;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state handed to every Axum handler: the cloneable handles onto the
/// three actors a node runs. Cheap to clone — each field is itself a
/// cloneable mailbox handle or an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub replicator: ReplicatorHandle,
    pub gateway: UpstreamGatewayHandle,
    pub register: Arc<StatusRegister>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/lines/{line_id}/status", get(get_line_range))
        .route("/circuit", get(get_circuit))
        .route("/healthz", get(get_healthz))
        .route("/internal/gossip", post(post_gossip))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(rename = "maxAgeMs")]
    max_age_ms: Option<u64>,
}

async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, AppError> {
    let reply = match query.max_age_ms {
        Some(max_age_ms) => {
            state
                .replicator
                .get_status_with_freshness(Some(max_age_ms))
                .await
        }
        None => state.replicator.get_status().await,
    };

    let Some(snapshot) = reply.snapshot else {
        return Err(AppError::NoCachedData);
    };

    Ok(snapshot_response(snapshot, reply.is_stale, reply.requested_max_age_ms))
}

#[derive(Debug, Deserialize)]
struct LineRangeQuery {
    from: NaiveDate,
    to: NaiveDate,
}

async fn get_line_range(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
    Query(query): Query<LineRangeQuery>,
) -> Result<Response, AppError> {
    let snapshot = state
        .gateway
        .fetch_line_range(line_id, query.from, query.to)
        .await?;
    Ok(snapshot_response(snapshot, false, None))
}

fn snapshot_response(snapshot: Snapshot, is_stale: bool, requested_max_age_ms: Option<u64>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Cache-Stale",
        HeaderValue::from_static(if is_stale { "true" } else { "false" }),
    );
    if let Some(max_age_ms) = requested_max_age_ms {
        if let Ok(value) = HeaderValue::from_str(&max_age_ms.to_string()) {
            headers.insert("X-Requested-Max-Age-Ms", value);
        }
    }
    (headers, Json(snapshot)).into_response()
}

async fn get_circuit(State(state): State<AppState>) -> impl IntoResponse {
    let circuit_state = state.gateway.circuit_state().await;
    Json(json!({ "state": format!("{circuit_state:?}") }))
}

async fn get_healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn post_gossip(
    State(state): State<AppState>,
    Json(snapshot): Json<Snapshot>,
) -> impl IntoResponse {
    state.register.receive_gossip(snapshot).await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cache_upstream::{UpstreamClient, UpstreamClientConfig, UpstreamGateway};
    use cache_replicator::{Replicator, ReplicatorConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let client = UpstreamClient::new(UpstreamClientConfig {
            base_url: "http://127.0.0.1:0".into(),
            node_id: "node-a".into(),
            ..Default::default()
        });
        let gateway = UpstreamGateway::spawn(client, 8);
        let register = Arc::new(StatusRegister::new(vec![]));
        let replicator = Replicator::spawn(
            ReplicatorConfig {
                node_id: "node-a".into(),
                refresh_interval: Duration::from_secs(3600),
                fresh_enough_threshold: Duration::from_secs(10),
                background_refresh_threshold: Duration::from_secs(5),
            },
            gateway.clone(),
            Arc::clone(&register),
            32,
        );
        AppState {
            replicator,
            gateway,
            register,
        }
    }

    #[tokio::test]
    async fn status_with_no_cached_data_is_503() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn circuit_starts_closed() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/circuit").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
