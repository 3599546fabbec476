use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::ApiClient;
pub use error::ApiError;

/// A request against the daemon's HTTP API, sent as a JSON body
pub trait ApiRequest: Serialize {
    type Response: DeserializeOwned;

    /// Absolute path of the endpoint
    const PATH: &'static str;
    const METHOD: Method = Method::POST;
}
