//! Unmount volume endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnmountVolumeRequest {
    pub name: String,
    #[serde(rename = "ID", default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnmountVolumeResponse {
    #[serde(rename = "Err", default)]
    pub err: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<UnmountVolumeRequest>,
) -> Result<impl IntoResponse, PluginError> {
    tracing::info!(volume = %req.name, id = %req.id, "unmount volume");
    state.mount_manager().unmount(&req.name).await?;

    Ok((http::StatusCode::OK, Json(UnmountVolumeResponse::default())))
}

impl ApiRequest for UnmountVolumeRequest {
    type Response = UnmountVolumeResponse;

    const PATH: &'static str = "/VolumeDriver.Unmount";
}
