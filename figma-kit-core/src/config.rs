use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{FigmaError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.figma.com/v1";

/// How the client reacts to transient failures (429 and 5xx).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    /// Wait after a 429 that carries no usable `Retry-After` header.
    #[serde(with = "seconds")]
    pub default_retry_after: Duration,
    /// Wait after a 5xx response.
    #[serde(with = "seconds")]
    pub server_error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            default_retry_after: Duration::from_secs(5),
            server_error_delay: Duration::from_secs(1),
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Credentials and endpoint for [`FigmaClient`](crate::client::FigmaClient).
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub access_token: String,
    pub base_url: String,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(FigmaError::MissingCredentials);
        }
        Ok(ClientConfig {
            access_token,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            max_attempts = self.retry.max_attempts,
            "Loaded client config"
        );
        debug!(?self, "Client config loaded (full debug)");
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

fn file_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"figma\.com/(?:design|file)/([A-Za-z0-9]+)").ok())
        .as_ref()
}

/// Accepts a bare file key or a figma.com `/design/` or `/file/` URL.
pub fn parse_file_key(input: &str) -> String {
    let input = input.trim();
    match file_url_pattern().and_then(|re| re.captures(input)) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}
