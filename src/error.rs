//! Error taxonomy for the API client and the table engine.

use thiserror::Error;

/// Errors raised by the client layers.
///
/// HTTP error responses from domain calls are *not* represented here: they are
/// normalized into a [`crate::client::response::Normalized`] and rendered like
/// any other result. Only failures that cannot produce a body end up as an
/// `ApiError`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credential exchange failed. Fatal at client construction.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Network-level failure (connect, TLS, timeout) that survived retries.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Streaming retries were exhausted.
    #[error("data streaming failed after {attempts} attempt(s); last error: {last_error}")]
    DataStreamingFailure { attempts: u32, last_error: String },

    /// The table engine was handed something other than a list of objects.
    #[error("cannot render table: {0}")]
    RenderingInput(String),

    /// Profile or settings problem detected before any request was made.
    #[error("configuration error: {0}")]
    Config(String),

    /// A header value (token, workspace id, api key) is not valid ASCII.
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;
