//! # contract: seams between the pipeline and the outside world
//!
//! Two traits live here:
//! - [`Transport`]: one HTTP GET, nothing else. [`ReqwestTransport`](crate::client::ReqwestTransport)
//!   is the real implementation; tests script responses with `MockTransport`.
//! - [`FigmaApi`]: the typed Figma REST surface the CLI and the sync pipeline call.
//!   [`FigmaClient`](crate::client::FigmaClient) implements it on top of any `Transport`,
//!   including the retry policy; tests of the pipeline use `MockFigmaApi`.
//!
//! Both are annotated for `mockall`. With the `test-export-mocks` feature the mocks are
//! exported to downstream crates as well.

use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;

/// A response as seen by the retry loop; the body is kept as text until the status is known.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, when the server sent a numeric one.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        HttpResponse {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        HttpResponse {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues `GET url?query`. Only network-level failures are errors; any HTTP status
    /// comes back as a response.
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

/// Output format for rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    Png,
    Jpg,
    #[default]
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "svg" => Ok(ImageFormat::Svg),
            "pdf" => Ok(ImageFormat::Pdf),
            other => Err(format!(
                "unsupported image format '{other}' (expected png, jpg, svg or pdf)"
            )),
        }
    }
}

/// The Figma REST endpoints this toolkit reads. Every method returns the decoded JSON body.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FigmaApi: Send + Sync {
    /// `GET /files/:key/nodes` with vector geometry and shared plugin data.
    async fn fetch_nodes(
        &self,
        file_key: &str,
        node_ids: &[String],
        depth: Option<u32>,
    ) -> Result<Value>;

    /// `GET /files/:key/variables/local`. `Ok(None)` when the plan or token has no access
    /// to variables (HTTP 403).
    async fn fetch_local_variables(&self, file_key: &str) -> Result<Option<Value>>;

    /// `GET /files/:key/styles`
    async fn fetch_styles(&self, file_key: &str) -> Result<Value>;

    /// `GET /files/:key/components`
    async fn fetch_components(&self, file_key: &str) -> Result<Value>;

    /// `GET /images/:key`: render URLs per node id.
    async fn fetch_image_urls(
        &self,
        file_key: &str,
        node_ids: &[String],
        format: ImageFormat,
        scale: f64,
    ) -> Result<Value>;

    /// `GET /files/:key`, optionally limited to `depth` levels.
    async fn fetch_file(&self, file_key: &str, depth: Option<u32>) -> Result<Value>;
}
