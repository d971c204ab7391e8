//! Error types for the interaction domain
//!
//! Every failure surfaced by the engine is an [`InteractionError`]: a closed
//! [`ErrorKind`], a human-readable message and an optional underlying cause.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias used throughout the crate
pub type InteractionResult<T> = Result<T, InteractionError>;

/// The kinds of failure the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A record that was required to exist could not be found
    NotFound,
    /// The key-value store refused to persist a record
    Persistence,
    /// Input or stored data had an unexpected shape
    Validation,
    /// The application is wired incorrectly (unknown state, bad options)
    Configuration,
    /// An operation was attempted before its prerequisites ran
    TaskOrdering,
    /// An outbound HTTP call failed
    Http,
}

impl ErrorKind {
    /// Message used when no explicit message is given
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "record not found",
            ErrorKind::Persistence => "failed to persist record",
            ErrorKind::Validation => "invalid value",
            ErrorKind::Configuration => "invalid configuration",
            ErrorKind::TaskOrdering => "operation attempted out of order",
            ErrorKind::Http => "http request failed",
        }
    }

    /// Short name of the kind, used as the message prefix
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Persistence => "persistence error",
            ErrorKind::Validation => "validation error",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::TaskOrdering => "task ordering error",
            ErrorKind::Http => "http error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by the interaction engine
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct InteractionError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<anyhow::Error>,
}

impl InteractionError {
    /// Create an error of the given kind with its default message
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            cause: None,
        }
    }

    /// Create an error of the given kind with an explicit message
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::NotFound, message)
    }

    /// A store-reported persistence failure; `reason` is the store's own text
    pub fn persistence(reason: Option<String>) -> Self {
        match reason {
            Some(reason) => Self::with_message(ErrorKind::Persistence, reason),
            None => Self::new(ErrorKind::Persistence),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Validation, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Configuration, message)
    }

    pub fn task_ordering(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::TaskOrdering, message)
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<serde_json::Error> for InteractionError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("malformed record: {err}")).with_cause(err)
    }
}
