// src/error.rs
//! Application error types with structured error handling.
//!
//! Each variant names the layer that failed: transport, the remote
//! application envelope, a page stream, document structure or local
//! configuration. Reference-resolution failures never reach this type;
//! the resolver degrades them into warnings.

use std::fmt;
use thiserror::Error;

/// Lark open platform error codes as a typed vocabulary.
///
/// The platform reports failures as a numeric `code` inside an HTTP 200
/// envelope. Only the codes the client reacts to get their own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LarkErrorCode {
    /// No access token was attached to the request
    MissingAccessToken,
    /// The access token is invalid or has expired
    InvalidAccessToken,
    /// Request frequency limit triggered
    RateLimited,
    /// Platform-side internal error
    InternalError,
    /// A code this client has no special handling for
    Other(i64),
}

impl LarkErrorCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            99991661 => Self::MissingAccessToken,
            99991663 | 99991664 | 99991668 | 99991677 => Self::InvalidAccessToken,
            99991400 => Self::RateLimited,
            1254290 | 1255040 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::InternalError)
    }

    /// Whether a cached access token should be dropped.
    pub fn is_token_invalid(&self) -> bool {
        matches!(self, Self::MissingAccessToken | Self::InvalidAccessToken)
    }
}

impl fmt::Display for LarkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccessToken => write!(f, "missing_access_token"),
            Self::InvalidAccessToken => write!(f, "invalid_access_token"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::InternalError => write!(f, "internal_error"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Violations of the document block-tree invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("No root block to render")]
    MissingRoot,

    #[error("More than one root block: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("Block {block_id} refers to missing parent {parent_id}")]
    DanglingParent { block_id: String, parent_id: String },

    #[error("Block {0} appears more than once")]
    DuplicateBlock(String),
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("HTTP {status} returned for {path}")]
    HttpStatus { status: u16, path: String },

    #[error("Lark API returned an error ({code}) for {path}: {msg}")]
    Remote {
        code: i64,
        msg: String,
        path: String,
    },

    #[error("Malformed response from {path}: {reason}")]
    MalformedResponse { path: String, reason: String },

    #[error("Page stream over {path} failed after page token {last_cursor:?}: {source}")]
    Stream {
        path: String,
        last_cursor: Option<String>,
        #[source]
        source: Box<AppError>,
    },

    #[error("Document structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AppError {
    pub fn malformed(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MalformedResponse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// The typed remote code, when this error came from the application envelope.
    pub fn remote_code(&self) -> Option<LarkErrorCode> {
        match self {
            Self::Remote { code, .. } => Some(LarkErrorCode::from_code(*code)),
            Self::Stream { source, .. } => source.remote_code(),
            _ => None,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkFailure(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Remote { .. } => self.remote_code().is_some_and(|c| c.is_retryable()),
            _ => false,
        }
    }

    /// The cursor a caller can resume a failed stream from.
    pub fn last_cursor(&self) -> Option<&str> {
        match self {
            Self::Stream { last_cursor, .. } => last_cursor.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_token_codes() {
        assert!(LarkErrorCode::from_code(99991663).is_token_invalid());
        assert!(LarkErrorCode::from_code(99991661).is_token_invalid());
        assert!(!LarkErrorCode::from_code(1254043).is_token_invalid());
        assert_eq!(LarkErrorCode::from_code(42), LarkErrorCode::Other(42));
    }

    #[test]
    fn stream_error_exposes_inner_code_and_cursor() {
        let err = AppError::Stream {
            path: "wiki/v2/spaces".into(),
            last_cursor: Some("p2".into()),
            source: Box::new(AppError::Remote {
                code: 99991400,
                msg: "too many requests".into(),
                path: "wiki/v2/spaces".into(),
            }),
        };
        assert_eq!(err.remote_code(), Some(LarkErrorCode::RateLimited));
        assert_eq!(err.last_cursor(), Some("p2"));
        assert!(!err.is_transient());
        assert!(err.to_string().contains("wiki/v2/spaces"));
    }

    #[test]
    fn structure_error_messages() {
        assert_eq!(
            StructureError::MissingRoot.to_string(),
            "No root block to render"
        );
        let err = StructureError::DanglingParent {
            block_id: "b".into(),
            parent_id: "ghost".into(),
        };
        assert_eq!(err.to_string(), "Block b refers to missing parent ghost");
    }
}
