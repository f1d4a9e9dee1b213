//! Figma REST client: endpoint paths, the retry loop and response decoding.
//!
//! [`FigmaClient`] is generic over its [`Transport`] so the retry behaviour can be
//! exercised against scripted responses. [`ReqwestTransport`] is the production transport.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::contract::{FigmaApi, HttpResponse, ImageFormat, Transport};
use crate::error::{FigmaError, Result};
use crate::model::parse_json;

const TOKEN_HEADER: &str = "X-Figma-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ReqwestTransport {
    http: reqwest::Client,
    access_token: String,
}

impl ReqwestTransport {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FigmaError::Transport(e.to_string()))?;
        Ok(ReqwestTransport {
            http,
            access_token: access_token.into(),
        })
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url, "HTTP request failed");
                FigmaError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response
            .text()
            .await
            .map_err(|e| FigmaError::Transport(e.to_string()))?;

        debug!(url, status, bytes = body.len(), "Received response");
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

pub struct FigmaClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
}

impl FigmaClient<ReqwestTransport> {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.access_token.clone())?;
        config.trace_loaded();
        Ok(FigmaClient { config, transport })
    }
}

impl<T: Transport> FigmaClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        FigmaClient { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GETs `path` until it succeeds, fails permanently or runs out of attempts.
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let url = format!("{}{}", self.config.base_url, path);
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self.transport.get(&url, query).await?;
            let status = response.status;

            if response.is_success() {
                return Ok(response);
            }

            let delay = match status {
                429 => {
                    if attempt >= max_attempts {
                        return Err(FigmaError::RateLimited {
                            url,
                            attempts: attempt,
                        });
                    }
                    response.retry_after.unwrap_or(policy.default_retry_after)
                }
                s if s >= 500 => {
                    if attempt >= max_attempts {
                        return Err(FigmaError::Server {
                            url,
                            status,
                            attempts: attempt,
                        });
                    }
                    policy.server_error_delay
                }
                403 => return Err(FigmaError::PermissionDenied { url }),
                _ => {
                    return Err(FigmaError::Http {
                        url,
                        status,
                        body: response.body,
                    })
                }
            };

            warn!(
                url = %url,
                status,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient Figma API failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let response = self.get(path, query).await?;
        parse_json(&response.body).map_err(|source| FigmaError::Decode {
            url: format!("{}{}", self.config.base_url, path),
            source,
        })
    }
}

fn pair(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[async_trait]
impl<T: Transport> FigmaApi for FigmaClient<T> {
    async fn fetch_nodes(
        &self,
        file_key: &str,
        node_ids: &[String],
        depth: Option<u32>,
    ) -> Result<Value> {
        info!(file_key, nodes = node_ids.len(), "Fetching nodes");
        let mut query = vec![
            pair("ids", node_ids.join(",")),
            pair("geometry", "paths"),
            pair("plugin_data", "shared"),
        ];
        if let Some(depth) = depth {
            query.push(pair("depth", depth));
        }
        self.get_json(&format!("/files/{file_key}/nodes"), &query)
            .await
    }

    async fn fetch_local_variables(&self, file_key: &str) -> Result<Option<Value>> {
        info!(file_key, "Fetching local variables");
        match self
            .get_json(&format!("/files/{file_key}/variables/local"), &[])
            .await
        {
            Ok(body) => Ok(Some(body)),
            Err(FigmaError::PermissionDenied { url }) => {
                warn!(url = %url, "Variables API not accessible (403), continuing without variables");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_styles(&self, file_key: &str) -> Result<Value> {
        info!(file_key, "Fetching styles");
        self.get_json(&format!("/files/{file_key}/styles"), &[])
            .await
    }

    async fn fetch_components(&self, file_key: &str) -> Result<Value> {
        info!(file_key, "Fetching components");
        self.get_json(&format!("/files/{file_key}/components"), &[])
            .await
    }

    async fn fetch_image_urls(
        &self,
        file_key: &str,
        node_ids: &[String],
        format: ImageFormat,
        scale: f64,
    ) -> Result<Value> {
        info!(file_key, nodes = node_ids.len(), %format, scale, "Fetching image URLs");
        let query = vec![
            pair("ids", node_ids.join(",")),
            pair("format", format),
            pair("scale", scale),
        ];
        self.get_json(&format!("/images/{file_key}"), &query).await
    }

    async fn fetch_file(&self, file_key: &str, depth: Option<u32>) -> Result<Value> {
        info!(file_key, ?depth, "Fetching file");
        let query: Vec<_> = depth.map(|d| pair("depth", d)).into_iter().collect();
        self.get_json(&format!("/files/{file_key}"), &query).await
    }
}
