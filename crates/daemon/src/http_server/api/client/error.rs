use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("daemon error: {0}")]
    Plugin(String),
    #[error("unexpected status {0}: {1}")]
    HttpStatus(StatusCode, String),
}
