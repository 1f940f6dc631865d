//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (e.g. `--config <path>`)
//! 2. `~/.visage/config.toml` (user)
//! 3. `/etc/visage/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.visage/secrets.toml` (user, must be 0600)
//! 2. `/etc/visage/secrets.toml` (system, must be 0600)
//!
//! with environment variable fallbacks for each key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::placeholder::{DEFAULT_BADGE_BASE, DEFAULT_INITIAL_BASE, PlaceholderGenerator};
use crate::providers::{CdnStore, RateLimitConfig, TogetherClient, together};
use crate::{AvatarService, Result, VisageError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Durable tier; absent means no durable caching.
    #[serde(default)]
    pub durable: Option<DurableConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub placeholder: PlaceholderSettings,
}

/// Image provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Request timeout in seconds (default: 15).
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            model: default_model(),
            steps: default_steps(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_provider_base_url() -> String {
    together::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    together::DEFAULT_MODEL.to_string()
}

fn default_steps() -> u32 {
    together::DEFAULT_STEPS
}

fn default_provider_timeout() -> u64 {
    together::DEFAULT_TIMEOUT.as_secs()
}

/// Durable asset store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DurableConfig {
    /// Public prefix assets are served from.
    pub delivery_base: String,
    /// Upload endpoint.
    pub upload_url: String,
    /// Request timeout in seconds (default: 5).
    #[serde(default = "default_durable_timeout")]
    pub timeout_secs: u64,
}

fn default_durable_timeout() -> u64 {
    crate::providers::cdn::DEFAULT_TIMEOUT.as_secs()
}

/// Provider backoff bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Floor for backoff (default: 1500).
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Ceiling for backoff (default: 10000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_min_delay_ms() -> u64 {
    1500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        RateLimitConfig::new()
            .min_delay(Duration::from_millis(settings.min_delay_ms))
            .max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

/// Volatile cache sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> u64 {
    crate::cache::DEFAULT_VOLATILE_CACHE_MAX
}

/// Placeholder services.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceholderSettings {
    /// Badge renderer; empty string disables badges.
    #[serde(default = "default_badge_base")]
    pub badge_base: String,
    /// Initial-letter avatar service.
    #[serde(default = "default_initial_base")]
    pub initial_base: String,
    /// Upload placeholders to the durable store in the background.
    #[serde(default = "default_persist")]
    pub persist: bool,
}

impl Default for PlaceholderSettings {
    fn default() -> Self {
        Self {
            badge_base: default_badge_base(),
            initial_base: default_initial_base(),
            persist: default_persist(),
        }
    }
}

fn default_badge_base() -> String {
    DEFAULT_BADGE_BASE.to_string()
}

fn default_initial_base() -> String {
    DEFAULT_INITIAL_BASE.to_string()
}

fn default_persist() -> bool {
    true
}

impl PlaceholderSettings {
    /// Build the generator these settings describe.
    pub fn generator(&self) -> Result<PlaceholderGenerator> {
        let parse = |field: &str, value: &str| -> Result<Option<Url>> {
            if value.trim().is_empty() {
                return Ok(None);
            }
            Url::parse(value).map(Some).map_err(|e| {
                VisageError::Configuration(format!("invalid placeholder.{field} {value:?}: {e}"))
            })
        };
        Ok(PlaceholderGenerator::new()
            .badge_base(parse("badge_base", &self.badge_base)?)
            .initial_base(parse("initial_base", &self.initial_base)?))
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub together: Option<ApiKeySecret>,
    #[serde(default)]
    pub cdn: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Service name → environment variable name mapping.
const SECRET_ENV_VARS: &[(&str, &str)] = &[("together", "TOGETHER_API_KEY"), ("cdn", "CDN_API_KEY")];

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.visage/config.toml`
    /// 3. `/etc/visage/config.toml`
    ///
    /// With no explicit path and no file in either location, returns the
    /// defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VisageError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            VisageError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(VisageError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".visage").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/visage/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Build an [`AvatarService`] from this configuration.
    ///
    /// The provider tier is only enabled when a Together API key is
    /// available; without one every miss resolves to a placeholder.
    pub fn build_service(&self, secrets: &Secrets) -> Result<AvatarService> {
        let mut builder = AvatarService::builder()
            .rate_limit(RateLimitConfig::from(&self.rate_limit))
            .cache_max_entries(self.cache.max_entries)
            .placeholder(self.placeholder.generator()?)
            .persist_placeholders(self.placeholder.persist);

        if let Some(key) = secrets.api_key("together") {
            let client = TogetherClient::with_timeout(
                key,
                &self.provider.base_url,
                Duration::from_secs(self.provider.timeout_secs),
            )?
            .model(&self.provider.model)
            .steps(self.provider.steps);
            builder = builder.provider(Arc::new(client));
        }

        if let Some(durable) = &self.durable {
            let mut store = CdnStore::with_timeout(
                &durable.delivery_base,
                &durable.upload_url,
                Duration::from_secs(durable.timeout_secs),
            )?;
            if let Some(key) = secrets.api_key("cdn") {
                store = store.api_key(key);
            }
            builder = builder.durable_store(Arc::new(store));
        }

        builder.build()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.visage/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/visage/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".visage").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/visage/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Parse a specific secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            VisageError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            VisageError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            VisageError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(VisageError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a service, falling back to its environment variable.
    ///
    /// A blank key counts as missing, in the file and in the environment.
    pub fn api_key(&self, service: &str) -> Option<String> {
        self.api_key_with(service, |var| std::env::var(var).ok())
    }

    fn api_key_with(&self, service: &str, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let present = |key: &String| !key.trim().is_empty();
        let from_file = match service {
            "together" => self.together.as_ref(),
            "cdn" => self.cdn.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone())
        .filter(present);

        from_file.or_else(|| {
            SECRET_ENV_VARS
                .iter()
                .find(|(name, _)| *name == service)
                .and_then(|(_, var)| env(var))
                .filter(present)
        })
    }
}
