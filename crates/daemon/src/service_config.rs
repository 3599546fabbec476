use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Where the container engine discovers volume plugins
pub const DEFAULT_PLUGIN_SOCKET: &str = "/run/docker/plugins/drivefs.sock";

/// Default drive root in the remote's document zone
pub const DEFAULT_ROOT_ID: &str = "FOLDER::com.apple.CloudDocs::root";

/// Service configuration, read from a TOML file.
///
/// Every field has a default so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the volume plugin API listens on
    pub listen_addr: SocketAddr,
    /// Unix socket the volume plugin API is also served on. An empty path
    /// disables it.
    pub listen_socket: Option<PathBuf>,
    /// Directory holding the session record and the volume database
    pub state_dir: PathBuf,
    /// Volumes are mounted at `<volume_root>/<name>`
    pub volume_root: PathBuf,
    /// Change feed poll interval per mounted volume
    pub poll_interval_secs: u64,
    /// Entry and attribute TTL handed to the kernel
    pub entry_ttl_secs: u64,
    /// Mount with `allow_other` so containers can access the volume
    pub allow_other: bool,
    /// Write logs to daily files in this directory in addition to stdout
    pub log_dir: Option<PathBuf>,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            listen_socket: Some(PathBuf::from(DEFAULT_PLUGIN_SOCKET)),
            state_dir: PathBuf::from("/mnt/state"),
            volume_root: PathBuf::from("/mnt/volumes"),
            poll_interval_secs: 5,
            entry_ttl_secs: 10,
            allow_other: true,
            log_dir: None,
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// The plugin socket path, if enabled
    pub fn plugin_socket(&self) -> Option<&Path> {
        self.listen_socket
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn entry_ttl(&self) -> Duration {
        Duration::from_secs(self.entry_ttl_secs)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.state_dir.join("volumes.db")
    }

    pub fn session_path(&self) -> PathBuf {
        self.state_dir.join(crate::remote::SESSION_FILE_NAME)
    }

    /// Local mountpoint for a volume
    pub fn mountpoint(&self, volume: &str) -> PathBuf {
        self.volume_root.join(volume)
    }
}

/// Which remote tree client backs the mounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Http,
    /// Ephemeral in-process drive, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub drivews_url: Url,
    pub docws_url: Url,
    pub origin: String,
    pub root_id: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Http,
            drivews_url: Url::parse("https://p63-drivews.icloud.com")
                .expect("static url is valid"),
            docws_url: Url::parse("https://p63-docws.icloud.com").expect("static url is valid"),
            origin: "https://www.icloud.com".to_string(),
            root_id: DEFAULT_ROOT_ID.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.entry_ttl(), Duration::from_secs(10));
        assert_eq!(config.remote.kind, RemoteKind::Http);
        assert_eq!(config.remote.root_id, DEFAULT_ROOT_ID);
        assert_eq!(config.plugin_socket(), Some(Path::new(DEFAULT_PLUGIN_SOCKET)));
    }

    #[test]
    fn test_empty_socket_path_disables_socket() {
        let config = Config::from_toml(r#"listen_socket = """#).unwrap();
        assert_eq!(config.plugin_socket(), None);

        let config = Config::from_toml(r#"listen_socket = "/tmp/drivefs.sock""#).unwrap();
        assert_eq!(config.plugin_socket(), Some(Path::new("/tmp/drivefs.sock")));
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml(
            r#"
            volume_root = "/srv/volumes"
            poll_interval_secs = 30

            [remote]
            kind = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.mountpoint("docs"), PathBuf::from("/srv/volumes/docs"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.remote.kind, RemoteKind::Memory);
        assert_eq!(config.remote.origin, "https://www.icloud.com");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/mnt/state"));
    }

    #[test]
    fn test_rejects_unknown_remote_kind() {
        assert!(Config::from_toml("[remote]\nkind = \"ftp\"").is_err());
    }
}
