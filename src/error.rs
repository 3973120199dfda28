//! Error types for sage-extract
//!
//! One crate-wide [`Error`] enum mirrors the protocol's failure taxonomy:
//! configuration problems are fatal at startup, builder problems indicate a
//! programming/input error, transport exhaustion is fatal for one request,
//! and every session/pagination parse failure is fatal for the scan that hit
//! it. [`ScanError`] wraps the underlying cause with the scan's entity and
//! the number of pages already durably written.

use thiserror::Error;

/// Result type alias for sage-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sage-extract
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is missing or invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "SAGE_COMPANY_ID")
        key: Option<String>,
    },

    /// A request document could not be built because a required parameter
    /// is missing or empty. Indicates a programming or input error; the
    /// builder never silently emits an incomplete document.
    #[error("cannot build {kind} request: missing {missing}")]
    MalformedRequest {
        /// The operation kind being built ("getAPISession", "readByQuery", "readMore")
        kind: &'static str,
        /// The required parameter that was absent or empty
        missing: &'static str,
    },

    /// All transport attempts failed with connection-level errors
    #[error("connection to gateway failed after {attempts} attempts")]
    ConnectionExhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The last connection-level error observed
        #[source]
        source: Box<Error>,
    },

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Authentication response is missing an expected element
    #[error("authentication response missing <{missing}>")]
    Auth {
        /// The element that was expected but not found
        missing: &'static str,
    },

    /// The session timeout in the authentication response is absent or
    /// unparseable. Fatal: without it the client can never know when to renew.
    #[error("unusable session timeout in authentication response: {detail}")]
    SessionTimeoutUnparseable {
        /// What exactly was wrong with the timeout value
        detail: String,
    },

    /// A query response lacks expected pagination metadata
    #[error("response missing pagination metadata: {detail}")]
    PageParse {
        /// The attribute or element that was absent or malformed
        detail: String,
    },

    /// A durable page write failed. Not retried by the core; the scan aborts
    /// with already-written pages preserved.
    #[error("sink write failed for {path}: {message}")]
    Sink {
        /// Destination path of the failed write
        path: String,
        /// Underlying failure description
        message: String,
    },

    /// A full scan aborted; carries entity and pages-written context
    #[error(transparent)]
    Scan(#[from] Box<ScanError>),

    /// XML read or write error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Terminal error for one scan: the underlying cause plus how far the scan got.
///
/// Pages counted here were durably acknowledged by the sink before the
/// failure and remain available as a partial result.
#[derive(Debug, Error)]
#[error("scan of {entity} aborted after {pages_written} page(s) written: {source}")]
pub struct ScanError {
    /// Entity the scan was extracting
    pub entity: String,
    /// Pages durably written before the failure
    pub pages_written: u32,
    /// The underlying cause
    #[source]
    pub source: Error,
}
