//! Error types at the module boundaries of the pipeline.

use thiserror::Error;

/// Failure of an external capability (embedding, translation, reranking, generation).
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("{capability} timed out after {secs}s")]
    Timeout { capability: &'static str, secs: u64 },

    /// Network errors, rate limits and 5xx responses. Worth retrying.
    #[error("{capability} temporarily unavailable: {message}")]
    Transient {
        capability: &'static str,
        message: String,
    },

    /// Auth failures, bad requests, malformed responses. Not retried.
    #[error("{capability} failed: {message}")]
    Permanent {
        capability: &'static str,
        message: String,
    },
}

impl CapabilityError {
    pub fn transient(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            capability,
            message: message.into(),
        }
    }

    pub fn permanent(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Permanent {
            capability,
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient { .. })
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(
        capability: &'static str,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Self {
        let message = format!("returned {status}: {body}");
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Self::transient(capability, message)
        } else {
            Self::permanent(capability, message)
        }
    }

    /// Classify a transport-level reqwest error.
    pub fn from_reqwest(capability: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::transient(capability, err.to_string())
        } else if err.is_decode() {
            Self::permanent(capability, format!("malformed response: {err}"))
        } else {
            Self::permanent(capability, err.to_string())
        }
    }
}

/// Failure to build, persist or load a vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no index found for dataset '{0}'")]
    NotFound(String),

    /// The on-disk entries could not be verified against their manifest.
    #[error("refusing to load unverified index for '{dataset}': {reason}")]
    Untrusted { dataset: String, reason: String },

    #[error("vector size mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),

    #[error("embedding failed: {0}")]
    Embedding(#[from] CapabilityError),
}

/// Failure anywhere inside the two-stage retrieval pipeline.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index load failed: {0}")]
    IndexLoad(#[from] IndexError),

    #[error("query translation failed: {0}")]
    Translation(#[source] CapabilityError),

    #[error("query embedding failed: {0}")]
    Embedding(#[source] CapabilityError),

    #[error("reranking failed: {0}")]
    Rerank(#[source] CapabilityError),
}

/// The generative model call failed.
#[derive(Debug, Error)]
#[error("answer generation failed: {0}")]
pub struct SynthesisError(#[from] pub CapabilityError);
