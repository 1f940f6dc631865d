//! Visage error types

use std::time::Duration;

/// Coarse failure classes the orchestrator reacts to.
///
/// Every [`VisageError`] maps onto exactly one kind via [`VisageError::kind()`].
/// The avatar service never returns these to its callers; they only drive
/// state transitions (disable the provider, back off, or skip persistence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Credentials rejected (401/403). Sticky until explicitly reset.
    Auth,
    /// Provider asked us to slow down (429).
    RateLimited,
    /// Timeout, network error, malformed response, unexpected status.
    Generic,
    /// The durable asset store could not be reached or refused the request.
    DurableStoreUnavailable,
}

impl FailureKind {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Auth => "auth",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Generic => "generic",
            FailureKind::DurableStoreUnavailable => "durable_store_unavailable",
        }
    }
}

/// Visage error types
#[derive(Debug, thiserror::Error)]
pub enum VisageError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Data errors
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Collaborator errors
    #[error("durable store error: {0}")]
    DurableStore(String),

    #[error("character store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl VisageError {
    /// Classify this error for the orchestrator.
    pub fn kind(&self) -> FailureKind {
        match self {
            VisageError::AuthenticationFailed => FailureKind::Auth,
            VisageError::RateLimited { .. } => FailureKind::RateLimited,
            VisageError::Api { status, .. } if *status == 401 || *status == 403 => {
                FailureKind::Auth
            }
            VisageError::Api { status: 429, .. } => FailureKind::RateLimited,
            VisageError::DurableStore(_) => FailureKind::DurableStoreUnavailable,
            _ => FailureKind::Generic,
        }
    }

    /// Whether a later attempt could plausibly succeed without operator action.
    pub fn is_transient(&self) -> bool {
        self.kind() != FailureKind::Auth && !matches!(self, VisageError::Configuration(_))
    }

    /// Provider-supplied `retry-after` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            VisageError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a transport-level reqwest error.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VisageError::Timeout
        } else {
            VisageError::Http(err.to_string())
        }
    }
}

/// Result type alias for Visage operations
pub type Result<T> = std::result::Result<T, VisageError>;
