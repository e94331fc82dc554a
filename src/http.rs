//! Low-level transport shared by the session store and the API client.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::error::ClientError;

/// Backend base URL plus a pooled HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Endpoint {
    http: reqwest::Client,
    base: Url,
}

impl Endpoint {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        Self::with_timeout(config.api_url.clone(), config.request_timeout)
    }

    pub fn with_timeout(base: Url, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Network)?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Starts a request to `path`, relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::Decode(format!("bad endpoint path {path:?}: {err}")))?;
        Ok(self.http.request(method, url))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Best-effort extraction of the backend's error message.
pub(crate) async fn error_message(response: Response) -> String {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    let Ok(bytes) = response.bytes().await else {
        return fallback;
    };
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
            ..
        }) => detail,
        Ok(ErrorBody {
            detail: Some(detail),
            ..
        }) => detail.to_string(),
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => {
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                fallback
            } else {
                text
            }
        }
    }
}

/// Maps a non-success status (other than 401, which callers handle) to an error.
pub(crate) async fn status_error(response: Response) -> ClientError {
    let status = response.status();
    let message = error_message(response).await;
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::Decode(err.to_string()))
}
