//! Error types for signalform
//!
//! Every failure surfaced by the library is one of a closed set of variants so
//! callers (the CLI in particular) can handle them exhaustively.

use thiserror::Error;

/// Top-level library error
#[derive(Debug, Error)]
pub enum Error {
    /// Construction-time or semantic validation failure
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No remote resource has exactly the requested name
    #[error("Could not find an exact match for \"{name}\" in SignalFx.")]
    NotFound {
        /// Name that was searched for
        name: String,
    },

    /// Exactly one remote resource already carries the requested name
    #[error("A resource with the name \"{name}\" already exists. Unwilling to override.")]
    AlreadyExists {
        /// Conflicting name
        name: String,
    },

    /// More than one remote resource carries the requested name
    #[error("\"{name}\" has more than one exact match in SignalFx. Unwilling to choose one at random.")]
    MultipleMatches {
        /// Ambiguous name
        name: String,
    },

    /// Request to the remote API failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Validation errors raised by builders and programs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required argument was empty or of the wrong shape
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No statement of the program reaches a `publish` transform
    #[error("program does not publish any stream; add a publish() call to at least one statement")]
    ProgramDoesNotPublish,
}

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API answered with a non-success status
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        /// HTTP method of the failed request
        method: String,
        /// Full request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Raw error body returned by the API
        body: String,
    },

    /// The token was rejected
    #[error(
        "the provided token could not authenticate with SignalFx; check that it is correct, \
         active, and free of surrounding whitespace"
    )]
    Unauthorized,

    /// The API rejected the method for this path
    #[error("{method} {url} is not allowed; this usually means the resource id is empty or missing")]
    MethodNotAllowed {
        /// HTTP method of the rejected request
        method: String,
        /// Full request URL
        url: String,
    },

    /// The token cannot be carried in an HTTP header
    #[error("invalid API token header: {0}")]
    InvalidToken(String),

    /// Underlying HTTP client error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ValidationError {
    /// Shorthand for an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationError::InvalidArgument(message.into())
    }
}

impl Error {
    /// Shorthand for an `InvalidArgument` validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::invalid(message))
    }

    /// True for the three reconciliation conflicts a caller can resolve with
    /// `--force` or `--interactive`.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::AlreadyExists { .. } | Error::MultipleMatches { .. }
        )
    }
}

/// Convenience result alias for validation-only operations
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Convenience result alias for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
