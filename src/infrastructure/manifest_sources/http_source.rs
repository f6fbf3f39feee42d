//! HTTP(S) `ManifestSource`: a plain GET with conditional `If-None-Match`,
//! bounded by the client's own request timeout. Retry/backoff and circuit
//! breaking live one layer up in `ManifestLoader`, not here.

use crate::domain::ports::manifest_source::{FetchError, FetchedManifest, ManifestSource};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

pub struct HttpManifestSource {
    id: String,
    url: String,
    client: reqwest::Client,
}

impl HttpManifestSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            client: reqwest::Client::builder().timeout(Duration::from_secs(10)).build().expect("reqwest client builds with static config"),
        }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, if_none_match: Option<&str>) -> Result<Option<FetchedManifest>, FetchError> {
        let mut request = self.client.get(&self.url);
        if let Some(etag) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() { FetchError::Timeout } else { FetchError::Unreachable(e.to_string()) }
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().to_string()));
        }

        let content_type = response.headers().get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
        let etag = response.headers().get(reqwest::header::ETAG).and_then(|v| v.to_str().ok()).map(str::to_string);
        let bytes = response.bytes().await.map_err(|e| FetchError::Unreachable(e.to_string()))?.to_vec();

        Ok(Some(FetchedManifest { bytes, content_type, etag }))
    }
}
