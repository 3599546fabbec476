use reqwest::{header::HeaderMap, header::HeaderValue, Client};
use serde::Deserialize;
use url::Url;

use super::error::ApiError;
use super::ApiRequest;
use crate::http_server::api::plugin::{
    CreateVolumeRequest, ListVolumesRequest, MountVolumeRequest, RemoveVolumeRequest,
    UnmountVolumeRequest, VolumeInfo,
};

/// Client for a running daemon's volume plugin API
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "Err", default)]
    err: String,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let url = self.remote.join(T::PATH)?;
        let response = self
            .client
            .request(T::METHOD, url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T::Response>().await?);
        }

        let body = response.text().await?;
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) if !error.err.is_empty() => Err(ApiError::Plugin(error.err)),
            _ => Err(ApiError::HttpStatus(status, body)),
        }
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    pub async fn create_volume(&self, name: &str, path: &str) -> Result<(), ApiError> {
        self.call(CreateVolumeRequest::new(name, path)).await?;
        Ok(())
    }

    pub async fn remove_volume(&self, name: &str) -> Result<(), ApiError> {
        self.call(RemoveVolumeRequest {
            name: name.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeInfo>, ApiError> {
        Ok(self.call(ListVolumesRequest {}).await?.volumes)
    }

    pub async fn mount_volume(&self, name: &str, id: &str) -> Result<String, ApiError> {
        let response = self
            .call(MountVolumeRequest {
                name: name.to_string(),
                id: id.to_string(),
            })
            .await?;
        Ok(response.mountpoint)
    }

    pub async fn unmount_volume(&self, name: &str, id: &str) -> Result<(), ApiError> {
        self.call(UnmountVolumeRequest {
            name: name.to_string(),
            id: id.to_string(),
        })
        .await?;
        Ok(())
    }
}
