//! Watch Client Error Hierarchy
//!
//! Separates the failures a caller has to react to:
//! - construction problems ([`Error::Config`]) raised synchronously before any
//!   network activity
//! - terminal transport failures ([`StreamError`]) surfaced once through the
//!   notification sequence
//!
//! Frames that fail to decode never reach this module; they are dropped by the
//! decoder and the stream carries on.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed construction parameters (base URL, collection, timeouts)
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Terminal transport failure of a watch stream
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The HTTP client could not be initialized
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Terminal failure of one watch connection.
///
/// Delivered to the caller exactly once, on the first pull after the failure,
/// and always followed by end-of-sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The streaming request could not be sent
    #[error("Watch stream connection failed: {message}")]
    Connect { message: String },

    /// The server answered with a non-success status
    #[error("Watch stream HTTP error {status}: {message}")]
    Status { status: u16, message: String },

    /// Reading the response body failed mid-stream
    #[error("Watch stream disconnected: {message}")]
    Disconnected { message: String },

    /// The server ended the response without the termination sentinel
    #[error("Watch stream closed by server")]
    ClosedByServer,
}

impl StreamError {
    /// Whether re-invoking `watch` (optionally with a resume token) may help.
    ///
    /// Authentication, authorization and addressing failures are permanent
    /// until the caller changes its parameters.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Status { status, .. } => !matches!(status, 400 | 401 | 403 | 404),
            StreamError::Connect { .. } | StreamError::Disconnected { .. } | StreamError::ClosedByServer => true,
        }
    }

    pub(crate) fn connect(err: impl std::fmt::Display) -> Self {
        StreamError::Connect {
            message: err.to_string(),
        }
    }

    pub(crate) fn disconnected(err: impl std::fmt::Display) -> Self {
        StreamError::Disconnected {
            message: err.to_string(),
        }
    }
}

/// Shorthand used by validation code across the crate.
pub(crate) fn config_error(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}
