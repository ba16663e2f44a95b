use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cache_model::FetchError;
use serde_json::json;

/// Maps the node's internal failure modes onto HTTP responses. Nothing
/// upstream of this boundary — the Replicator, the gateway, the register —
/// knows about status codes; they only ever deal in [`FetchError`] and
/// [`cache_model::StatusReply`].
pub enum AppError {
    /// No cached snapshot exists yet for this node.
    NoCachedData,
    Fetch(FetchError),
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::Fetch(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NoCachedData => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no cached status available yet".to_string(),
            ),
            AppError::Fetch(err) if err.is_circuit_open() => {
                (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            AppError::Fetch(err @ FetchError::RetriesExhausted { .. }) => {
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
            AppError::Fetch(err @ FetchError::UpdateTimeout) => {
                (StatusCode::GATEWAY_TIMEOUT, err.to_string())
            }
            AppError::Fetch(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
