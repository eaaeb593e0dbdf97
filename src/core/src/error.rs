//! Unified error type for remote calls, serialization, and sinks
//!
//! Every collaborator trait in this crate reports failures as a `CoreError`; the crawler
//! wraps them into its own pass-level taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type shared by all remote service implementations
#[derive(Debug, Error)]
pub enum CoreError {
    /// The remote service answered with a non-success status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The request never produced an answer (connect, TLS, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A row or batch was rejected by the warehouse sink
    #[error("Sink error: {0}")]
    Sink(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation observed cancellation before completing
    #[error("Cancelled")]
    Cancelled,

    /// Invalid input/state
    #[error("Invalid: {0}")]
    Invalid(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create a remote error from a status code and body
    pub fn remote<S: Into<String>>(status: u16, msg: S) -> Self {
        CoreError::Remote {
            status,
            message: msg.into(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        CoreError::Transport(msg.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        CoreError::Serialization(msg.into())
    }

    /// Create a sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        CoreError::Sink(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CoreError::Configuration(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        CoreError::NotFound(msg.into())
    }

    /// Create an invalid error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        CoreError::Invalid(msg.into())
    }

    /// Whether this error is a 404 from the remote side or a local not-found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::NotFound(_) | CoreError::Remote { status: 404, .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
