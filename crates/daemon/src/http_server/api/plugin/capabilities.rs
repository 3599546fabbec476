//! Volume driver capabilities endpoint

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::http_server::api::client::ApiRequest;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capabilities {
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capabilities,
}

/// Volumes are local to this host
#[tracing::instrument]
pub async fn handler() -> Response {
    (
        http::StatusCode::OK,
        Json(CapabilitiesResponse {
            capabilities: Capabilities {
                scope: "local".to_string(),
            },
        }),
    )
        .into_response()
}

impl ApiRequest for CapabilitiesRequest {
    type Response = CapabilitiesResponse;

    const PATH: &'static str = "/VolumeDriver.Capabilities";
}
