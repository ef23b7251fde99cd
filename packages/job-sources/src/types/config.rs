//! Adapter and registry configuration.

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::{SourceError, SourceResult};

/// Default per-adapter timeout for a fan-out call.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// How a source obtains its listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Api,
    Scrape,
    Rss,
    Manual,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Api => "api",
            SourceKind::Scrape => "scrape",
            SourceKind::Rss => "rss",
            SourceKind::Manual => "manual",
        }
    }
}

/// Request budget for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub requests_per_minute: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }
}

/// A credential value that won't be logged or displayed.
pub struct Credential(SecretBox<str>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the secret value for use.
    ///
    /// Only call this when actually using the secret (e.g., in an API request).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Configuration of one job source adapter.
///
/// Built once when the registry is assembled; afterwards only the enabled
/// flag changes, and only through the registry.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Unique source name, also the `source` half of the dedup key
    pub name: String,

    pub kind: SourceKind,
    pub base_url: Option<String>,

    /// Initial enabled state
    pub enabled: bool,

    pub rate_limit: Option<RateLimit>,

    /// Overrides the registry-wide timeout for this source
    pub timeout: Option<Duration>,

    credentials: HashMap<String, Credential>,
}

impl SourceConfig {
    /// Create an enabled config with no limits or credentials.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::default(),
            base_url: None,
            enabled: true,
            rate_limit: None,
            timeout: None,
            credentials: HashMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<Credential>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Look up a credential.
    ///
    /// A missing credential is a source error, never a startup error: the
    /// adapter reports unhealthy and its searches fail in isolation.
    pub fn credential(&self, key: &str) -> SourceResult<&Credential> {
        self.credentials
            .get(key)
            .ok_or_else(|| SourceError::MissingCredential {
                source_name: self.name.clone(),
                key: key.to_string(),
            })
    }

    /// Fail with the first missing key, if any.
    pub fn require_credentials(&self, keys: &[&str]) -> SourceResult<()> {
        for key in keys {
            self.credential(key)?;
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.credentials.is_empty()
    }
}

/// Registry-wide knobs.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Timeout applied to each adapter call unless the source overrides it
    pub source_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_source_error() {
        let config = SourceConfig::new("greenhouse").with_credential("api_key", "sk-123");
        assert_eq!(config.credential("api_key").unwrap().expose(), "sk-123");

        let err = config.require_credentials(&["api_key", "board_token"]).unwrap_err();
        assert!(matches!(
            err,
            SourceError::MissingCredential { ref key, .. } if key == "board_token"
        ));
    }

    #[test]
    fn test_credentials_are_redacted() {
        let config = SourceConfig::new("lever").with_credential("token", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
