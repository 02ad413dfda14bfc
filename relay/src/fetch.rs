use ontap_ipc::{FetchRequest, RelayResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

const LOG_PREVIEW_CHARS: usize = 180;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    #[error("invalid header {0}")]
    InvalidHeader(String),
    #[error("failed to serialize body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Performs relay fetches against the configured API base.
#[derive(Debug, Clone)]
pub struct FetchProxy {
    client: Client,
    api_base: String,
}

impl FetchProxy {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base)
    }

    pub fn with_client(client: Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { client, api_base }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Runs the request and reads the whole body as text.
    ///
    /// Any completed exchange is a success regardless of status code; only
    /// failures to issue or read the request become [`RelayResult::Failure`].
    pub async fn fetch(&self, request: FetchRequest) -> RelayResult {
        let url = self.url_for(&request.path);
        debug!(%url, method = %request.method, "ONTAPAI_FETCH");

        match self.try_fetch(&url, request).await {
            Ok((status, body)) => {
                debug!(status, body = %preview(&body), "Fetch completed");
                RelayResult::success(status, body)
            }
            Err(e) => {
                warn!(%url, error = %e, "Fetch failed");
                RelayResult::failure(e.to_string())
            }
        }
    }

    async fn try_fetch(
        &self,
        url: &str,
        request: FetchRequest,
    ) -> Result<(u16, String), FetchError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;
        let headers = merge_headers(&request.headers)?;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// JSON content type first, then caller headers on top. Header names compare
/// case-insensitively, so a caller `content-type` replaces the default.
fn merge_headers(caller: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in caller {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(format!("name {:?}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| FetchError::InvalidHeader(format!("value for {}", name)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

fn preview(body: &str) -> String {
    body.chars().take(LOG_PREVIEW_CHARS).collect()
}
