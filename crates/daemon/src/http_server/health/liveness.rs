use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Always answers `{"status":"ok"}` while the process is serving requests.
/// Used by external healthchecks; a failure here usually means the daemon is
/// wedged and should be restarted.
#[tracing::instrument]
pub async fn handler() -> Response {
    let msg = serde_json::json!({"status": "ok"});
    (StatusCode::OK, Json(msg)).into_response()
}
