//! Error taxonomy shared by the cache, buffers and the filesystem layer.

/// Failure talking to the remote drive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse remote response: {0}")]
    Parse(String),
    #[error("no authenticated session")]
    Unauthenticated,
}

/// Errors surfaced by filesystem-facing operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Lookup miss. A normal outcome, not a hard failure.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation against an unknown volume, inode or handle.
    #[error("invalid state: {0}")]
    State(String),
    /// A write would grow a file past the buffer limit.
    #[error("file too large: {requested} bytes exceeds the {limit} byte limit")]
    FileTooLarge { requested: u64, limit: u64 },
    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl DriveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }
}

pub type Result<T, E = DriveError> = std::result::Result<T, E>;
