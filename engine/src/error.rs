//! Error types for the sync engine.

use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Transport errors
    #[error("failed to fetch '{locator}': {message}")]
    Transport { locator: String, message: String },

    #[error("continuation link revisits '{0}'")]
    ContinuationLoop(String),

    // Schema errors
    #[error("record is missing identifier field '{0}'")]
    MissingIdentifier(String),

    #[error("identifier field '{field}' must be an integer or string, got {got}")]
    InvalidIdentifier { field: String, got: String },

    #[error("field '{field}' must be a scalar, got {got}")]
    UnsupportedValue { field: String, got: String },

    #[error("invalid page: {0}")]
    InvalidPage(String),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Session errors
    #[error("a sync is already running for this store")]
    Busy,

    #[error("sync cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of an [`Error`], as reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A page fetch failed; nothing was rolled back.
    Transport,
    /// A remote record or page could not be interpreted.
    Schema,
    /// Local persistence failed; uncommitted mutations were kept.
    Storage,
    /// A pass was already running.
    Busy,
    /// The consumer cancelled the pass.
    Cancelled,
    Config,
}

impl Error {
    /// Shorthand for a transport failure on `locator`.
    pub fn transport(locator: impl Into<String>, message: impl ToString) -> Self {
        Error::Transport {
            locator: locator.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } | Error::ContinuationLoop(_) => ErrorKind::Transport,
            Error::MissingIdentifier(_)
            | Error::InvalidIdentifier { .. }
            | Error::UnsupportedValue { .. }
            | Error::InvalidPage(_) => ErrorKind::Schema,
            Error::Storage(_) | Error::InvalidSnapshot(_) => ErrorKind::Storage,
            Error::Busy => ErrorKind::Busy,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::MissingIdentifier("id".into());
        assert_eq!(err.to_string(), "record is missing identifier field 'id'");

        let err = Error::transport("http://localhost/api/notes", "connection refused");
        assert_eq!(
            err.to_string(),
            "failed to fetch 'http://localhost/api/notes': connection refused"
        );

        let err = Error::InvalidIdentifier {
            field: "id".into(),
            got: "Bool".into(),
        };
        assert_eq!(
            err.to_string(),
            "identifier field 'id' must be an integer or string, got Bool"
        );
    }

    #[test]
    fn kinds_group_variants() {
        assert_eq!(Error::transport("x", "y").kind(), ErrorKind::Transport);
        assert_eq!(
            Error::ContinuationLoop("x".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::InvalidPage("x".into()).kind(), ErrorKind::Schema);
        assert_eq!(Error::Storage("disk full".into()).kind(), ErrorKind::Storage);
        assert_eq!(Error::Busy.kind(), ErrorKind::Busy);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
