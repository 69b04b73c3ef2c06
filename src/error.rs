//! Error types shared by the ingestion and query pipeline.
//!
//! `ProviderError` covers the two external services (embeddings and text
//! generation); `RagError` is what pipeline operations return to callers.
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::index::IndexError;

/// Errors raised by an external embedding or generation provider.
///
/// Messages never contain credentials; response bodies are truncated.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    /// The request could not be built or followed, e.g. a malformed base URL.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::InvalidRequest(_) | Self::InvalidResponse(_) | Self::MissingCredentials(_) => {
                false
            }
        }
    }

    /// Map a `reqwest` failure, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() || err.is_redirect() {
            Self::InvalidRequest(err.without_url().to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.without_url().to_string())
        } else {
            // The URL may embed a key in some deployments; drop it.
            Self::Transport(err.without_url().to_string())
        }
    }

    /// Map a non-success HTTP status and its body.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let body = truncate_body(body);
        if status == 429 {
            Self::RateLimited(body)
        } else {
            Self::Http { status, body }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Errors returned by pipeline operations.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} failed: {source}")]
    Provider {
        operation: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("the index is empty; no documents were indexed")]
    EmptyIndex,

    #[error("no indexed chunk is relevant to the question")]
    EmptyRetrieval,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("index was built with embedding model {index}, but the embedder is {embedder}")]
    ModelMismatch { index: String, embedder: String },

    #[error("index snapshot {}: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn provider(operation: &'static str, source: ProviderError) -> Self {
        Self::Provider { operation, source }
    }
}
