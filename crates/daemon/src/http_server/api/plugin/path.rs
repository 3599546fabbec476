//! Volume path endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumePathRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumePathResponse {
    pub mountpoint: String,
    #[serde(default)]
    pub err: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<VolumePathRequest>,
) -> Result<impl IntoResponse, PluginError> {
    let volume = state.mount_manager().get(&req.name).await?;

    Ok((
        http::StatusCode::OK,
        Json(VolumePathResponse {
            mountpoint: volume.mount_point,
            err: String::new(),
        }),
    ))
}

impl ApiRequest for VolumePathRequest {
    type Response = VolumePathResponse;

    const PATH: &'static str = "/VolumeDriver.Path";
}
