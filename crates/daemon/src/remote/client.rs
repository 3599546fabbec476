use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE, ORIGIN};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use common::{
    ContinuationMarker, NodeId, RemoteError, RemoteFolder, RemoteItem, RemoteTree,
    UploadReceipt, UploadTarget,
};

use super::session::SessionRecord;
use crate::service_config::RemoteConfig;

/// Page size used for change feed requests
const FEED_LIMIT: &str = "50";

/// HTTP client for the drive web services.
///
/// Folder metadata comes from the `drivews` host, document content and the
/// change feed from the `docws` host. Every request replays the session
/// cookies; without a session every call fails with
/// [`RemoteError::Unauthenticated`].
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    drivews: Url,
    docws: Url,
    origin: String,
    root_id: NodeId,
    session: Option<SessionRecord>,
}

impl DriveClient {
    pub fn new(config: &RemoteConfig, session: Option<SessionRecord>) -> Result<Self, RemoteError> {
        let client = Client::builder().build().map_err(transport)?;
        Ok(Self {
            client,
            drivews: config.drivews_url.clone(),
            docws: config.docws_url.clone(),
            origin: config.origin.clone(),
            root_id: NodeId::new(config.root_id.clone()),
            session: session.filter(|s| !s.is_empty()),
        })
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn endpoint(base: &Url, path: &str) -> Result<Url, RemoteError> {
        let base = base.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, path)).map_err(|e| RemoteError::Parse(e.to_string()))
    }

    fn docws_endpoint(&self, zone: &str, path: &str) -> Result<Url, RemoteError> {
        Self::endpoint(&self.docws, &format!("ws/{}/{}", zone, path))
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let session = self.session.as_ref().ok_or(RemoteError::Unauthenticated)?;
        let cookie = HeaderValue::from_str(&session.cookie_header())
            .map_err(|e| RemoteError::Parse(format!("invalid session cookie: {}", e)))?;
        Ok(self
            .client
            .request(method, url)
            .header(ORIGIN, self.origin.as_str())
            .header(COOKIE, cookie))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, RemoteError> {
        builder.send().await.map_err(transport)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, RemoteError> {
        let response = check_status(Self::send(builder).await?).await?;
        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RemoteTree for DriveClient {
    fn root_id(&self) -> NodeId {
        self.root_id.clone()
    }

    async fn fetch_node(&self, id: &NodeId) -> Result<RemoteFolder, RemoteError> {
        let url = Self::endpoint(&self.drivews, "retrieveItemDetailsInFolders")?;
        let body = [FolderRequest { drivewsid: id.as_str() }];
        let builder = self.request(Method::POST, url)?.json(&body);

        let folders: Vec<FolderData> = Self::send_json(builder).await?;
        let folder = folders
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Parse(format!("no folder data returned for {}", id)))?;
        tracing::debug!(id = %id, items = folder.items.len(), "fetched folder");
        Ok(folder.into())
    }

    async fn fetch_content(&self, zone: &str, doc_id: &str) -> Result<Bytes, RemoteError> {
        let url = self.docws_endpoint(zone, "download/by_id")?;
        let builder = self
            .request(Method::GET, url)?
            .query(&[("document_id", doc_id)]);
        let token: DownloadResponse = Self::send_json(builder).await?;

        let url = Url::parse(&token.data_token.url).map_err(|e| RemoteError::Parse(e.to_string()))?;
        let response = Self::send(self.request(Method::GET, url)?).await?;
        // Zero-length documents have no content to hand out
        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(Bytes::new());
        }
        let response = check_status(response).await?;
        response.bytes().await.map_err(transport)
    }

    async fn begin_upload(&self, zone: &str, filename: &str) -> Result<UploadTarget, RemoteError> {
        let url = self.docws_endpoint(zone, "upload/web")?;
        let body = UploadUrlRequest {
            filename,
            kind: "FILE",
            content_type: "",
        };
        let builder = self.request(Method::POST, url)?.json(&body);

        let targets: Vec<UploadUrlResponse> = Self::send_json(builder).await?;
        let target = targets
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::Parse("no upload target returned".to_string()))?;
        Ok(UploadTarget {
            document_id: target.document_id,
            url: target.url,
        })
    }

    async fn put_content(
        &self,
        target: &UploadTarget,
        data: Bytes,
    ) -> Result<UploadReceipt, RemoteError> {
        let url = Url::parse(&target.url).map_err(|e| RemoteError::Parse(e.to_string()))?;
        let builder = self
            .request(Method::POST, url)?
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);

        let response: UploadFileResponse = Self::send_json(builder).await?;
        let file = response.single_file;
        Ok(UploadReceipt {
            reference_checksum: file.reference_checksum,
            file_checksum: file.file_checksum,
            wrapping_key: file.wrapping_key,
            size: file.size,
            receipt: file.receipt,
        })
    }

    async fn commit_upload(
        &self,
        zone: &str,
        doc_id: &str,
        receipt: &UploadReceipt,
    ) -> Result<(), RemoteError> {
        let url = self.docws_endpoint(zone, "update/documents")?;
        let body = UpdateDocumentRequest {
            document_id: doc_id,
            command: "modify_file",
            data: UpdateDocumentData {
                reference_signature: &receipt.reference_checksum,
                signature: &receipt.file_checksum,
                wrapping_key: &receipt.wrapping_key,
                size: receipt.size,
                receipt: &receipt.receipt,
            },
        };
        let builder = self.request(Method::POST, url)?.json(&body);
        check_status(Self::send(builder).await?).await?;
        Ok(())
    }

    async fn poll_change_feed(&self) -> Result<ContinuationMarker, RemoteError> {
        let url = self.docws_endpoint("_all_", "list/enumerate/recentDocs")?;
        let builder = self
            .request(Method::GET, url)?
            .query(&[("limit", FEED_LIMIT)]);
        let feed: ChangeFeedResponse = Self::send_json(builder).await?;
        Ok(ContinuationMarker(feed.continuation_marker))
    }

    async fn has_advanced(&self, marker: &ContinuationMarker) -> Result<bool, RemoteError> {
        let url = self.docws_endpoint("_all_", "list/changes/recentDocs")?;
        let builder = self
            .request(Method::GET, url)?
            .query(&[("limit", FEED_LIMIT), ("nextPage", marker.0.as_str())]);
        let response = Self::send(builder).await?;
        if response.status() == StatusCode::RESET_CONTENT {
            return Ok(true);
        }
        check_status(response).await?;
        Ok(false)
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::warn!(status = status.as_u16(), "drive rejected session");
    }
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Serialize)]
struct FolderRequest<'a> {
    drivewsid: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemData {
    drivewsid: String,
    docwsid: String,
    zone: String,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    etag: String,
    #[serde(default)]
    date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    date_changed: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct FolderData {
    #[serde(flatten)]
    node: ItemData,
    #[serde(default)]
    items: Vec<ItemData>,
}

impl From<ItemData> for RemoteItem {
    fn from(item: ItemData) -> Self {
        let date_created = item.date_created.unwrap_or_default();
        Self {
            id: NodeId::new(item.drivewsid),
            zone: item.zone,
            doc_id: item.docwsid,
            name: item.name,
            extension: item.extension.filter(|e| !e.is_empty()),
            size: item.size,
            etag: item.etag,
            date_created,
            date_changed: item.date_changed.unwrap_or(date_created),
        }
    }
}

impl From<FolderData> for RemoteFolder {
    fn from(folder: FolderData) -> Self {
        Self {
            node: folder.node.into(),
            items: folder.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataToken {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    data_token: DataToken,
}

#[derive(Serialize)]
struct UploadUrlRequest<'a> {
    filename: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    document_id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    #[serde(rename = "singleFile")]
    single_file: UploadFileData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFileData {
    reference_checksum: String,
    file_checksum: String,
    wrapping_key: String,
    size: u64,
    receipt: String,
}

#[derive(Serialize)]
struct UpdateDocumentRequest<'a> {
    document_id: &'a str,
    command: &'a str,
    data: UpdateDocumentData<'a>,
}

#[derive(Serialize)]
struct UpdateDocumentData<'a> {
    reference_signature: &'a str,
    signature: &'a str,
    wrapping_key: &'a str,
    size: u64,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeFeedResponse {
    continuation_marker: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_payload_maps_to_remote_folder() {
        let raw = r#"{
            "drivewsid": "FOLDER::zone::root",
            "docwsid": "root",
            "zone": "zone",
            "name": "root",
            "type": "FOLDER",
            "etag": "1",
            "items": [
                {
                    "drivewsid": "FILE::zone::b",
                    "docwsid": "b",
                    "zone": "zone",
                    "name": "b",
                    "extension": "txt",
                    "size": 3,
                    "type": "FILE",
                    "etag": "2",
                    "dateCreated": "2024-01-02T03:04:05Z",
                    "dateChanged": "2024-02-02T03:04:05Z"
                }
            ]
        }"#;

        let folder: RemoteFolder = serde_json::from_str::<FolderData>(raw).unwrap().into();

        assert_eq!(folder.node.id, NodeId::new("FOLDER::zone::root"));
        assert!(folder.node.extension.is_none());
        assert_eq!(folder.items.len(), 1);
        let item = &folder.items[0];
        assert_eq!(item.extension.as_deref(), Some("txt"));
        assert_eq!(item.size, 3);
        assert!(item.date_changed > item.date_created);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let base = Url::parse("http://127.0.0.1:1234/").unwrap();
        let url = DriveClient::endpoint(&base, "ws/zone/upload/web").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:1234/ws/zone/upload/web");
    }

    #[tokio::test]
    async fn test_no_session_is_unauthenticated() {
        let client = DriveClient::new(&RemoteConfig::default(), None).unwrap();
        assert!(!client.has_session());

        let err = client.poll_change_feed().await.unwrap_err();
        assert!(matches!(err, RemoteError::Unauthenticated));
        let err = client
            .fetch_node(&NodeId::new("FOLDER::zone::root"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Unauthenticated));
    }

    #[test]
    fn test_empty_session_counts_as_missing() {
        let client =
            DriveClient::new(&RemoteConfig::default(), Some(SessionRecord::default())).unwrap();
        assert!(!client.has_session());
    }
}
