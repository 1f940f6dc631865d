//! HTTP client for a CDN-backed asset store.
//!
//! Assets live at a predictable delivery URL, `{delivery_base}/{key}.png`,
//! so existence is a plain `HEAD`. Uploads are "fetch from this URL" calls:
//! the store pulls the source image itself, which keeps image bytes out of
//! this process entirely.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::together::check_status;
use super::traits::DurableStore;
use crate::types::CacheKey;
use crate::{Result, VisageError};

/// Store probes and uploads are abandoned after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the durable asset store.
#[derive(Clone)]
pub struct CdnStore {
    http: Client,
    delivery_base: String,
    upload_url: String,
    api_key: Option<String>,
}

impl CdnStore {
    /// Create a store client.
    ///
    /// * `delivery_base` - public prefix assets are served from
    /// * `upload_url` - endpoint accepting `{file, public_id, overwrite}` JSON
    pub fn new(delivery_base: impl Into<String>, upload_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(delivery_base, upload_url, DEFAULT_TIMEOUT)
    }

    /// Create a store client with a custom request timeout.
    pub fn with_timeout(
        delivery_base: impl Into<String>,
        upload_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisageError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            delivery_base: delivery_base.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into(),
            api_key: None,
        })
    }

    /// Authenticate uploads with a bearer token.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    file: &'a str,
    public_id: &'a str,
    overwrite: bool,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl DurableStore for CdnStore {
    fn name(&self) -> &str {
        "cdn"
    }

    fn asset_url(&self, key: &CacheKey) -> String {
        format!("{}/{}.png", self.delivery_base, key)
    }

    async fn head(&self, key: &CacheKey) -> Result<bool> {
        let response = self
            .http
            .head(self.asset_url(key))
            .send()
            .await
            .map_err(|e| VisageError::DurableStore(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(&response).map_err(|e| VisageError::DurableStore(e.to_string()))?;
        Ok(true)
    }

    async fn upload(&self, source_url: &str, key: &CacheKey) -> Result<Option<String>> {
        let mut request = self.http.post(&self.upload_url).json(&UploadRequest {
            file: source_url,
            public_id: key.as_str(),
            overwrite: true,
        });
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| VisageError::DurableStore(e.to_string()))?;
        check_status(&response).map_err(|e| VisageError::DurableStore(e.to_string()))?;

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| VisageError::DurableStore(e.to_string()))?;

        Ok(body
            .secure_url
            .or(body.url)
            .filter(|url| !url.trim().is_empty()))
    }
}
