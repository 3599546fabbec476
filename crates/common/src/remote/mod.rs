//! Remote drive client interface
//!
//! The remote store is document oriented: folders are fetched together with
//! their immediate children, file contents are fetched and uploaded whole, and
//! a change feed can only answer "has anything changed since this marker".
//! Implementations are expected to be already authenticated.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::node::NodeId;

pub mod memory;

pub use memory::MemoryRemote;

/// Metadata for one remote file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: NodeId,
    pub zone: String,
    pub doc_id: String,
    pub name: String,
    pub extension: Option<String>,
    pub size: u64,
    pub etag: String,
    pub date_created: DateTime<Utc>,
    pub date_changed: DateTime<Utc>,
}

/// A fetched folder and its immediate children, in remote order.
#[derive(Debug, Clone)]
pub struct RemoteFolder {
    pub node: RemoteItem,
    pub items: Vec<RemoteItem>,
}

/// Where to send the bytes of a whole-object upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub document_id: String,
    pub url: String,
}

/// Checksums and receipt returned by the upload target, used to link the
/// uploaded bytes to an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub reference_checksum: String,
    pub file_checksum: String,
    pub wrapping_key: String,
    pub size: u64,
    pub receipt: String,
}

/// Opaque cursor into the remote change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationMarker(pub String);

/// Authenticated calls against the remote drive.
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// Id of the drive's top-level folder.
    fn root_id(&self) -> NodeId;

    /// Fetch a folder's metadata together with its children.
    async fn fetch_node(&self, id: &NodeId) -> Result<RemoteFolder, RemoteError>;

    /// Fetch the whole content of a document.
    async fn fetch_content(&self, zone: &str, doc_id: &str) -> Result<Bytes, RemoteError>;

    /// Request an upload target for a file name.
    async fn begin_upload(&self, zone: &str, filename: &str)
        -> Result<UploadTarget, RemoteError>;

    /// Send the full object to an upload target.
    async fn put_content(
        &self,
        target: &UploadTarget,
        data: Bytes,
    ) -> Result<UploadReceipt, RemoteError>;

    /// Link an uploaded object to a document, replacing its content.
    async fn commit_upload(
        &self,
        zone: &str,
        doc_id: &str,
        receipt: &UploadReceipt,
    ) -> Result<(), RemoteError>;

    /// Obtain a fresh continuation marker from the change feed.
    async fn poll_change_feed(&self) -> Result<ContinuationMarker, RemoteError>;

    /// Whether the change feed has advanced past `marker`.
    async fn has_advanced(&self, marker: &ContinuationMarker) -> Result<bool, RemoteError>;
}
