//! Mount volume endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountVolumeRequest {
    pub name: String,
    /// Caller id, one per container using the volume
    #[serde(rename = "ID", default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountVolumeResponse {
    pub mountpoint: String,
    #[serde(default)]
    pub err: String,
}

/// The first mount of a volume mounts the remote folder; later ones only add
/// a reference
pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<MountVolumeRequest>,
) -> Result<impl IntoResponse, PluginError> {
    tracing::info!(volume = %req.name, id = %req.id, "mount volume");
    let mountpoint = state.mount_manager().mount(&req.name).await?;

    Ok((
        http::StatusCode::OK,
        Json(MountVolumeResponse {
            mountpoint: mountpoint.to_string_lossy().into_owned(),
            err: String::new(),
        }),
    ))
}

impl ApiRequest for MountVolumeRequest {
    type Response = MountVolumeResponse;

    const PATH: &'static str = "/VolumeDriver.Mount";
}
