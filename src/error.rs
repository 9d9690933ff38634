//! Error types for the CrUX client.

use thiserror::Error;

/// Result type for CrUX operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the CrUX client.
///
/// "Record not found" (API error code 404) is deliberately absent: it is
/// surfaced as `None` per query, not as an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The request itself failed at the transport level: a non-200 status
    /// on the batch endpoint, or a 5xx status on a single-record query.
    /// Never retried.
    #[error("CrUX API transport failure ({status}): {body}")]
    Transport {
        /// HTTP status code of the failed call.
        status: u16,
        /// Raw response body, kept as a diagnostic.
        body: String,
    },

    /// The API returned an error code this client does not handle
    /// (anything other than 404 and 429). Fatal for the whole call.
    #[error("CrUX API error ({code} {status}): {message}")]
    Api {
        /// Numeric error code from the response body.
        code: u16,
        /// Human-readable message.
        message: String,
        /// Symbolic status, e.g. `INTERNAL`.
        status: String,
    },

    /// Rate limiting persisted past the retry budget.
    #[error("max retries reached after {attempts} attempts")]
    RetriesExhausted {
        /// Total HTTP calls made, including the initial one.
        attempts: u32,
    },

    /// A response payload carried neither a record nor an error object.
    #[error("invalid CrUX API response: {0}")]
    MalformedResponse(String),

    /// Network or HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
