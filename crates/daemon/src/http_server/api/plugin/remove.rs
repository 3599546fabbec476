//! Remove volume endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveVolumeRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveVolumeResponse {
    #[serde(rename = "Err", default)]
    pub err: String,
}

/// Delete the volume record and its mountpoint directory. Refused while the
/// volume is mounted.
pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<RemoveVolumeRequest>,
) -> Result<impl IntoResponse, PluginError> {
    tracing::info!(volume = %req.name, "remove volume");
    state.mount_manager().remove(&req.name).await?;

    Ok((http::StatusCode::OK, Json(RemoveVolumeResponse::default())))
}

impl ApiRequest for RemoveVolumeRequest {
    type Response = RemoveVolumeResponse;

    const PATH: &'static str = "/VolumeDriver.Remove";
}
