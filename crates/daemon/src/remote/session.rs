use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// File name of the session record inside the state directory
pub const SESSION_FILE_NAME: &str = "session.json";

/// An already-issued drive session.
///
/// Login and two-factor flows live outside this crate; the daemon only
/// replays the cookies they produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

impl SessionRecord {
    /// Load a session record, returning `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, SessionError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    /// Value for an HTTP `Cookie` header
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read session: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid session record: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_is_sorted_and_joined() {
        let mut record = SessionRecord::default();
        record
            .cookies
            .insert("X-APPLE-WEBAUTH-USER".into(), "user".into());
        record
            .cookies
            .insert("X-APPLE-WEBAUTH-TOKEN".into(), "token".into());

        assert_eq!(
            record.cookie_header(),
            "X-APPLE-WEBAUTH-TOKEN=token; X-APPLE-WEBAUTH-USER=user"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SessionRecord::load(&dir.path().join(SESSION_FILE_NAME)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE_NAME);
        std::fs::write(&path, r#"{"cookies":{"a":"1"}}"#).unwrap();

        let loaded = SessionRecord::load(&path).unwrap().unwrap();
        assert_eq!(loaded.cookie_header(), "a=1");
    }
}
