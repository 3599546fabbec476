//! Get volume endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson, VolumeInfo};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetVolumeRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetVolumeResponse {
    pub volume: VolumeInfo,
    #[serde(default)]
    pub err: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<GetVolumeRequest>,
) -> Result<impl IntoResponse, PluginError> {
    let volume = state.mount_manager().get(&req.name).await?;

    Ok((
        http::StatusCode::OK,
        Json(GetVolumeResponse {
            volume: volume.into(),
            err: String::new(),
        }),
    ))
}

impl ApiRequest for GetVolumeRequest {
    type Response = GetVolumeResponse;

    const PATH: &'static str = "/VolumeDriver.Get";
}
