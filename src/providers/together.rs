//! Together AI image generation client.
//!
//! Talks to the OpenAI-compatible `/v1/images/generations` endpoint and
//! asks for a URL response rather than inline base64.
//! See: <https://docs.together.ai/reference/post-images-generations>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::ImageProvider;
use crate::{Result, VisageError};

/// Default base URL for the Together API
pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz";

/// Default image model.
pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-dev";

/// Default diffusion steps.
pub const DEFAULT_STEPS: u32 = 28;

/// Generation calls are abandoned after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Together image generation API.
#[derive(Clone)]
pub struct TogetherClient {
    api_key: String,
    http: Client,
    base_url: String,
    model: String,
    steps: u32,
}

impl TogetherClient {
    /// Create a client against the public API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL and request timeout.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisageError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            steps: DEFAULT_STEPS,
        })
    }

    /// Override the image model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the number of diffusion steps.
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Generate a single image and return its URL.
    pub async fn generate_image(&self, prompt: &str, width: u32, height: u32) -> Result<String> {
        let url = format!("{}/v1/images/generations", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&GenerationRequest {
                model: &self.model,
                prompt,
                width,
                height,
                steps: self.steps,
                n: 1,
                response_format: "url",
            })
            .send()
            .await
            .map_err(VisageError::from_reqwest)?;

        check_status(&response)?;

        let body = response.text().await.map_err(VisageError::from_reqwest)?;
        let parsed: GenerationResponse = serde_json::from_str(&body)?;

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| VisageError::InvalidResponse("no image URL in response".to_string()))
    }
}

/// Check response status and map to the crate error taxonomy.
pub(crate) fn check_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 | 403 => Err(VisageError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(VisageError::RateLimited { retry_after })
        }
        code => Err(VisageError::Api {
            status: code,
            message: format!("unexpected status: {status}"),
        }),
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    steps: u32,
    n: u32,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    url: Option<String>,
}

// ============================================================================
// Provider Trait Implementation
// ============================================================================

#[async_trait]
impl ImageProvider for TogetherClient {
    fn name(&self) -> &str {
        "together"
    }

    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<String> {
        self.generate_image(prompt, width, height).await
    }
}
