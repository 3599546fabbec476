//! List volumes endpoint

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, VolumeInfo};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVolumesRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListVolumesResponse {
    pub volumes: Vec<VolumeInfo>,
    #[serde(default)]
    pub err: String,
}

pub async fn handler(State(state): State<ServiceState>) -> Result<impl IntoResponse, PluginError> {
    let volumes = state.mount_manager().list().await?;

    Ok((
        http::StatusCode::OK,
        Json(ListVolumesResponse {
            volumes: volumes.into_iter().map(Into::into).collect(),
            err: String::new(),
        }),
    ))
}

impl ApiRequest for ListVolumesRequest {
    type Response = ListVolumesResponse;

    const PATH: &'static str = "/VolumeDriver.List";
}
