/// `load_config` module: loads the optional YAML settings file and the access token.
///
/// The YAML file only carries non-secret settings. The token always comes from the
/// `--token` flag or the `FIGMA_ACCESS_TOKEN` environment variable (a `.env` file is
/// honoured, see `main`).
///
/// Accepted YAML (every key optional):
///
/// ```yaml
/// api:
///   base_url: https://api.figma.com/v1
/// retry:
///   max_attempts: 3
///   default_retry_after: 5   # seconds
///   server_error_delay: 1    # seconds
/// split:
///   max_lines: 250
/// sync:
///   output_dir: ./figma-data
/// ```
use anyhow::Result;
use figma_kit_core::config::{ClientConfig, RetryPolicy, DEFAULT_BASE_URL};
use figma_kit_core::split::DEFAULT_MAX_LINES;
use figma_kit_core::FigmaError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const TOKEN_ENV: &str = "FIGMA_ACCESS_TOKEN";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api: ApiSection,
    pub retry: RetryPolicy,
    pub split: SplitSection,
    pub sync: SyncSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        ApiSection {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SplitSection {
    pub max_lines: usize,
}

impl Default for SplitSection {
    fn default() -> Self {
        SplitSection {
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub output_dir: PathBuf,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            output_dir: PathBuf::from("figma-data"),
        }
    }
}

impl CliConfig {
    /// Client settings for `access_token`, using this file's endpoint and retry policy.
    pub fn client_config(&self, access_token: String) -> Result<ClientConfig> {
        Ok(ClientConfig::new(access_token)?
            .with_base_url(self.api.base_url.clone())
            .with_retry(self.retry.clone()))
    }
}

/// Loads a YAML settings file. Missing keys fall back to their defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, all-defaults config.
    if config_content.trim().is_empty() {
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// `--token` wins over `FIGMA_ACCESS_TOKEN`; blank values count as missing.
pub fn resolve_token(flag: Option<String>) -> Result<String> {
    let token = flag
        .filter(|t| !t.trim().is_empty())
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|t| !t.trim().is_empty());
    match token {
        Some(token) => Ok(token),
        None => {
            error!(env = TOKEN_ENV, "No Figma access token provided");
            Err(FigmaError::MissingCredentials.into())
        }
    }
}
