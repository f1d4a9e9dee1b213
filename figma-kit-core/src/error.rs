//! Error taxonomy shared by the client, the sync pipeline and the split tool.

use std::path::PathBuf;

/// Everything that can go wrong while talking to the Figma API or reading local input.
#[derive(Debug, thiserror::Error)]
pub enum FigmaError {
    /// 429 responses kept coming until the attempt cap was reached.
    #[error("rate limited by Figma API after {attempts} attempts ({url})")]
    RateLimited { url: String, attempts: u32 },

    /// 5xx responses kept coming until the attempt cap was reached.
    #[error("Figma API server error {status} after {attempts} attempts ({url})")]
    Server {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("access denied by Figma API ({url})")]
    PermissionDenied { url: String },

    /// Any other non-success status. Never retried.
    #[error("Figma API returned HTTP {status} for {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("no node found in {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("FIGMA_ACCESS_TOKEN is missing")]
    MissingCredentials,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FigmaError {
    /// Transient failures are the ones the client retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, FigmaError::RateLimited { .. } | FigmaError::Server { .. })
    }
}

pub type Result<T, E = FigmaError> = std::result::Result<T, E>;
