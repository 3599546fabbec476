//! Plugin handshake endpoint

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http_server::api::client::ApiRequest;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivateRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<String>,
}

/// Announce which plugin protocols this daemon implements
#[tracing::instrument]
pub async fn handler() -> Response {
    (
        http::StatusCode::OK,
        Json(ActivateResponse {
            implements: vec!["VolumeDriver".to_string()],
        }),
    )
        .into_response()
}

impl ApiRequest for ActivateRequest {
    type Response = ActivateResponse;

    const PATH: &'static str = "/Plugin.Activate";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_direct() {
        let response = handler().await;
        assert_eq!(response.status(), http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        assert_eq!(&body[..], b"{\"Implements\":[\"VolumeDriver\"]}");
    }
}
