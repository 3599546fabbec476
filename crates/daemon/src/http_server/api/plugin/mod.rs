//! Docker volume plugin endpoints
//!
//! Every endpoint is a JSON `POST`. Failures reply with HTTP 500 and
//! `{"Err": "<message>"}`; successful replies carry an empty `Err`.
//!
//! The engine only sends an `Accept: application/vnd.docker.plugins.v1.2+json`
//! header, so request bodies are decoded with [`PluginJson`] rather than
//! axum's `Json`, which insists on a JSON `Content-Type`.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::database::models::Volume;
use crate::fuse::MountError;
use crate::ServiceState;

mod activate;
mod capabilities;
mod create;
mod get;
mod list;
mod mount;
mod path;
mod remove;
mod unmount;

pub use activate::{ActivateRequest, ActivateResponse};
pub use capabilities::{Capabilities, CapabilitiesRequest, CapabilitiesResponse};
pub use create::{CreateVolumeRequest, CreateVolumeResponse};
pub use get::{GetVolumeRequest, GetVolumeResponse};
pub use list::{ListVolumesRequest, ListVolumesResponse};
pub use mount::{MountVolumeRequest, MountVolumeResponse};
pub use path::{VolumePathRequest, VolumePathResponse};
pub use remove::{RemoveVolumeRequest, RemoveVolumeResponse};
pub use unmount::{UnmountVolumeRequest, UnmountVolumeResponse};

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/Plugin.Activate", post(activate::handler))
        .route("/VolumeDriver.Capabilities", post(capabilities::handler))
        .route("/VolumeDriver.Create", post(create::handler))
        .route("/VolumeDriver.Remove", post(remove::handler))
        .route("/VolumeDriver.Get", post(get::handler))
        .route("/VolumeDriver.List", post(list::handler))
        .route("/VolumeDriver.Mount", post(mount::handler))
        .route("/VolumeDriver.Unmount", post(unmount::handler))
        .route("/VolumeDriver.Path", post(path::handler))
        .with_state(state)
}

/// A volume as reported to the container engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<Volume> for VolumeInfo {
    fn from(volume: Volume) -> Self {
        Self {
            created_at: volume
                .created_at
                .format(&time::format_description::well_known::Rfc3339)
                .ok(),
            name: volume.name,
            mountpoint: volume.mount_point,
        }
    }
}

/// JSON request body, decoded whatever the `Content-Type`. An empty or
/// `null` body yields the default request.
#[derive(Debug, Clone)]
pub struct PluginJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for PluginJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = PluginError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| PluginError::Body(e.body_text()))?;
        let body = body.trim_ascii();
        if body.is_empty() {
            return Ok(Self(T::default()));
        }
        let request: Option<T> = serde_json::from_slice(body)?;
        Ok(Self(request.unwrap_or_default()))
    }
}

/// Error reply shared by every plugin endpoint
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("invalid request body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "Err")]
    err: String,
}

impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "volume plugin request failed");
        (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                err: self.to_string(),
            }),
        )
            .into_response()
    }
}
