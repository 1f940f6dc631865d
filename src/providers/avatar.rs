//! Turns a subject into a generation request.
//!
//! [`AvatarProvider`] owns prompt construction and the fixed output size,
//! and reports failures as a [`FailureKind`] so the orchestrator can branch
//! on them without inspecting HTTP details.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::traits::ImageProvider;
use crate::error::FailureKind;
use crate::telemetry;
use crate::types::Subject;

/// Output edge length in pixels. Portraits are always square.
pub const AVATAR_SIZE: u32 = 256;

/// Build the natural-language prompt for a subject.
pub fn prompt_for(subject: &Subject) -> String {
    match subject.description() {
        Some(description) => format!(
            "A portrait of {}, who is {}. Detailed, high quality.",
            subject.name, description
        ),
        None => format!(
            "A portrait of a character named {}. Detailed, high quality.",
            subject.name
        ),
    }
}

/// Image provider wrapper that speaks in subjects and failure kinds.
#[derive(Clone)]
pub struct AvatarProvider {
    inner: Arc<dyn ImageProvider>,
}

impl AvatarProvider {
    pub fn new(inner: Arc<dyn ImageProvider>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Generate a portrait and return its transient URL.
    pub async fn generate(&self, subject: &Subject) -> Result<String, FailureKind> {
        let prompt = prompt_for(subject);
        let start = Instant::now();
        let result = self
            .inner
            .generate(&prompt, AVATAR_SIZE, AVATAR_SIZE)
            .await;

        let outcome = match result {
            Ok(url) if is_absolute_url(&url) => Ok(url),
            Ok(url) => {
                warn!(provider = self.name(), %url, "provider returned a non-absolute URL");
                Err(FailureKind::Generic)
            }
            Err(e) => {
                let kind = match e.kind() {
                    FailureKind::DurableStoreUnavailable => FailureKind::Generic,
                    kind => kind,
                };
                warn!(provider = self.name(), error = %e, kind = kind.as_str(), "avatar generation failed");
                Err(kind)
            }
        };

        self.record(start, &outcome);
        if let Ok(url) = &outcome {
            debug!(provider = self.name(), subject = %subject.name, %url, "avatar generated");
        }
        outcome
    }

    fn record(&self, start: Instant, outcome: &Result<String, FailureKind>) {
        let status = match outcome {
            Ok(_) => "ok",
            Err(kind) => kind.as_str(),
        };
        metrics::counter!(telemetry::PROVIDER_REQUESTS_TOTAL,
            "provider" => self.name().to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::PROVIDER_REQUEST_DURATION_SECONDS,
            "provider" => self.name().to_owned(),
        )
        .record(start.elapsed().as_secs_f64());
    }
}

/// Absolute `http`/`https` URL check.
pub(crate) fn is_absolute_url(candidate: &str) -> bool {
    url::Url::parse(candidate.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}
