use crate::domain::terminal::CollectConfiguration;
use crate::error::BackendError;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the merchant backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl BackendConfig {
    /// Parses `base_url`, making sure it ends with `/` so endpoints join under it.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let trimmed = base_url.trim();
        let normalised = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let base_url = Url::parse(&normalised).map_err(|e| {
            BackendError::Config(format!("invalid backend url {:?}: {}", base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(BackendError::Config(format!(
                "unsupported backend url scheme: {}",
                base_url.scheme()
            )));
        }
        Ok(Self { base_url, timeout })
    }
}

/// Settings for one checkout session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// `None` runs against the in-memory backend.
    pub backend: Option<BackendConfig>,
    pub collect: CollectConfiguration,
}
