//! Create volume endpoint

use std::collections::HashMap;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{PluginError, PluginJson};
use crate::http_server::api::client::ApiRequest;
use crate::ServiceState;

/// Create (or rebind) a volume. `Opts.path` names the remote folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
}

impl CreateVolumeRequest {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            opts: Some(HashMap::from([("path".to_string(), path.to_string())])),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeResponse {
    #[serde(rename = "Err", default)]
    pub err: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    PluginJson(req): PluginJson<CreateVolumeRequest>,
) -> Result<impl IntoResponse, PluginError> {
    tracing::info!(volume = %req.name, "create volume");
    let path = req.opts.as_ref().and_then(|opts| opts.get("path"));

    state
        .mount_manager()
        .create(&req.name, path.map(String::as_str))
        .await?;

    Ok((http::StatusCode::OK, Json(CreateVolumeResponse::default())))
}

impl ApiRequest for CreateVolumeRequest {
    type Response = CreateVolumeResponse;

    const PATH: &'static str = "/VolumeDriver.Create";
}
