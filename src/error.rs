//! Error types for sigres

use thiserror::Error;

/// Main error type for stream resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Player config not found: {0}")]
    ConfigNotFound(String),

    #[error("No stream map found in player config")]
    StreamMapMissing,

    #[error("Cipher function not found in player script")]
    CipherFunctionNotFound,

    #[error("Cipher helper unresolved: {0}")]
    CipherHelperUnresolved(String),

    #[error("Malformed stream entry: {0}")]
    MalformedStreamEntry(String),

    #[error("Invalid video ID: {0}")]
    InvalidVideoId(String),

    #[error("Player script URL not found")]
    ScriptUrlNotFound,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl ResolveError {
    /// Check if a fetch that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ResolveError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ResolveError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Check if the error means the remote page or script format changed
    pub fn is_format_change(&self) -> bool {
        matches!(
            self,
            ResolveError::ConfigNotFound(_)
                | ResolveError::StreamMapMissing
                | ResolveError::CipherFunctionNotFound
                | ResolveError::CipherHelperUnresolved(_)
                | ResolveError::ScriptUrlNotFound
        )
    }

    /// Check if the error only affects a single stream entry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ResolveError::MalformedStreamEntry(_))
    }
}
