//! Error types for reprocess-wps
//!
//! This module provides the error taxonomy of the library:
//! - Startup errors (invalid configuration)
//! - Protocol errors (unexpected response shapes, fatal HTTP statuses)
//! - Transient service failures that survived the retry budget
//! - Failures reported by the remote process itself
//! - Background download failures, surfaced when the result is requested

use crate::types::JobId;
use thiserror::Error;

/// Result type alias for reprocess-wps operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reprocess-wps
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "endpoint")
        key: Option<String>,
    },

    /// The service answered with something this client cannot use
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Every attempt failed with a transient error (timeout, gateway timeout)
    #[error("service unavailable at {url} after {attempts} attempts")]
    ServiceUnavailable {
        /// The URL that could not be reached
        url: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// The remote service explicitly reported that the process failed
    #[error("remote process failed: {message} (code: {code})")]
    RemoteProcess {
        /// Exception code reported by the service
        code: String,
        /// Exception text reported by the service
        message: String,
    },

    /// The product does not satisfy the business rules of the job type
    #[error("product rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Background download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Network error raised by the HTTP client during a single attempt
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unexpected or unusable answers from the processing service
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Non-success HTTP status that is not worth retrying
    #[error("service at {url} answered with status {status}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The service could not be reached at all (connection refused, DNS, TLS)
    #[error("cannot reach service at {url}: {reason}")]
    Unreachable {
        /// Requested URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The response body is not a well-formed XML document
    #[error("malformed XML document: {0}")]
    MalformedXml(String),

    /// A mandatory element or attribute is absent
    #[error("missing {0} in service response")]
    Missing(&'static str),

    /// An element or attribute is present but its value cannot be decoded
    #[error("invalid {field} value '{value}'")]
    InvalidValue {
        /// Element or attribute name
        field: &'static str,
        /// Raw value found in the document
        value: String,
    },

    /// The execute response carries a status this client does not handle
    #[error("process submission ended with unexpected status: {0}")]
    UnexpectedSubmissionStatus(String),

    /// The process identifier is not known to this client
    #[error("unsupported process '{0}'")]
    UnsupportedProcess(String),

    /// A URL handed to or returned by the service is not valid
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending text
        url: String,
        /// Parse failure
        reason: String,
    },
}

/// Reasons for refusing a product before any job is submitted
///
/// These are expected, frequent outcomes and are returned as values rather
/// than raised as system failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The job type accepts no parameters
    #[error("this transformer takes no parameters")]
    UnexpectedParameters,

    /// The product belongs to another mission
    #[error("product is not a Sentinel-2 product")]
    WrongMission,

    /// The product is not a Level-1C product
    #[error("product is not a Sentinel-2 L1C product")]
    WrongProductType,

    /// A mandatory metadata attribute is absent
    #[error("product attribute missing: {0}")]
    MissingAttribute(&'static str),

    /// The sensing date cannot be parsed
    #[error("cannot parse product sensing date '{0}'")]
    InvalidSensingDate(String),

    /// The sensing date is before the admission window
    #[error("product is too old to allow its transformation")]
    TooOld,

    /// The sensing date is after the admission window
    #[error(
        "the corresponding Level-2 product will be soon online as output of the nominal \
         systematic processing flow, no on-demand order is submitted"
    )]
    TooYoung,
}

/// Failure of a background download task
///
/// Cloneable so that every poll observing the finished task gets the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("download of {source_url} failed: {reason}")]
pub struct DownloadFailure {
    /// Archive location that was being fetched
    pub source_url: String,
    /// The reason the download or unpack failed
    pub reason: String,
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No download is registered for the job
    #[error("no download registered for job {job_id}")]
    NotFound {
        /// The job that was looked up
        job_id: JobId,
    },

    /// The background task failed
    #[error("download for job {job_id} failed: {failure}")]
    Failed {
        /// The job whose download failed
        job_id: JobId,
        /// What went wrong in the task
        failure: DownloadFailure,
    },

    /// The background task ended without reporting an outcome (aborted or panicked)
    #[error("download for job {job_id} was interrupted")]
    Interrupted {
        /// The job whose download was interrupted
        job_id: JobId,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
