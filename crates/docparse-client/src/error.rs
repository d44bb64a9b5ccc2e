//! Error types for parse client operations

use std::time::Duration;

use thiserror::Error;

/// Result type alias for parse client operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Placeholder used when an ERROR status carries no `error_code`
pub const MISSING_ERROR_CODE: &str = "No error code found";

/// Placeholder used when an ERROR status carries no `error_message`
pub const MISSING_ERROR_MESSAGE: &str = "No error message found";

/// Errors that can occur while submitting, polling, or fetching a parse job
#[derive(Error, Debug)]
pub enum ParseError {
    /// Client could not be configured (missing credential, bad option file)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File extension is not accepted by the parsing service
    #[error("Unsupported file type: {extension}. Supported types: {}", crate::file_types::SUPPORTED_EXTENSIONS.join(", "))]
    UnsupportedFileType { extension: String },

    /// In-memory content was given without a declared file type
    #[error("file_type is required for in-memory content")]
    MissingFileType,

    /// Input is neither an existing path, a URL, nor accompanied by a file type
    #[error("Cannot tell what '{0}' is: not an existing file, not a URL, and no file_type given")]
    AmbiguousInput(String),

    /// Input kind the client cannot upload
    #[error("Invalid input type: {0}")]
    UnsupportedInputType(String),

    /// Job did not finish within the configured budget
    #[error("Job {job_id} timed out after {} seconds", timeout.as_secs_f64())]
    JobTimeout { job_id: String, timeout: Duration },

    /// Service reported the job as failed
    #[error("Job failed: {code} - {message}")]
    JobFailed { code: String, message: String },

    /// Service reported a status outside the known protocol
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode response
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Coarse classification of a [`ParseError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential or option problems, raised before any request
    Configuration,
    /// The content source was rejected locally
    Input,
    /// The job ran but did not succeed
    Job,
    /// Lower-level network or HTTP fault
    Transport,
}

impl ParseError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Build a [`ParseError::JobFailed`] from optional server fields
    pub fn job_failed(code: Option<&str>, message: Option<&str>) -> Self {
        Self::JobFailed {
            code: code.unwrap_or(MISSING_ERROR_CODE).to_string(),
            message: message.unwrap_or(MISSING_ERROR_MESSAGE).to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnsupportedFileType { .. }
            | Self::MissingFileType
            | Self::AmbiguousInput(_)
            | Self::UnsupportedInputType(_) => ErrorKind::Input,
            Self::JobTimeout { .. } | Self::JobFailed { .. } | Self::UnexpectedStatus(_) => {
                ErrorKind::Job
            }
            Self::Http(_)
            | Self::Server { .. }
            | Self::InvalidUrl(_)
            | Self::Io(_)
            | Self::Decode(_) => ErrorKind::Transport,
        }
    }

    /// True for network/HTTP level faults
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}
