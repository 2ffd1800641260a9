// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for docbase operations.
//!
//! Provides structured error handling with detailed context for debugging.

use std::fmt;

/// Standard Result type for all docbase operations.
pub type DocbaseResult<T> = Result<T, DocbaseError>;

/// Error types for docbase operations.
#[derive(Debug, Clone)]
pub enum DocbaseError {
    /// Document not found.
    NotFound { collection: String, id: String },

    /// Document with this id already exists in the collection.
    DuplicateId { collection: String, id: String },

    /// Query or document JSON could not be parsed.
    ParseError { reason: String, fragment: String },

    /// Invalid configuration value.
    ConfigInvalid { reason: String },

    /// I/O error during filesystem operations.
    IoError { operation: String, reason: String },

    /// On-disk document failed to deserialise.
    Corrupt { collection: String, id: String, reason: String },

    /// Operation was cancelled via its cancellation token.
    Cancelled { operation: String },

    /// Operation exceeded its configured timeout.
    TimedOut { operation: String, timeout_ms: u64 },

    /// Authentication failed (no detail on which credential was wrong).
    AuthFailed,

    /// Requested operation or operator is not supported.
    Unsupported { reason: String },

    /// Internal invariant violation; the enclosing operation aborted.
    Internal { reason: String },
}

impl fmt::Display for DocbaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { collection, id } => {
                write!(f, "document '{}' not found in collection '{}'", id, collection)
            }
            Self::DuplicateId { collection, id } => {
                write!(f, "document '{}' already exists in collection '{}'", id, collection)
            }
            Self::ParseError { reason, fragment } => {
                write!(f, "parse error: {} (near '{}')", reason, fragment)
            }
            Self::ConfigInvalid { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
            Self::IoError { operation, reason } => {
                write!(f, "I/O error during '{}': {}", operation, reason)
            }
            Self::Corrupt { collection, id, reason } => {
                write!(
                    f,
                    "document '{}' in collection '{}' is corrupted: {}",
                    id, collection, reason
                )
            }
            Self::Cancelled { operation } => {
                write!(f, "operation '{}' was cancelled", operation)
            }
            Self::TimedOut { operation, timeout_ms } => {
                write!(f, "operation '{}' timed out after {}ms", operation, timeout_ms)
            }
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::Unsupported { reason } => write!(f, "unsupported: {}", reason),
            Self::Internal { reason } => write!(f, "internal error: {}", reason),
        }
    }
}

impl std::error::Error for DocbaseError {}

impl From<std::io::Error> for DocbaseError {
    fn from(err: std::io::Error) -> Self {
        DocbaseError::IoError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl DocbaseError {
    /// Stable wire error code, suitable for `protocol::ErrorResponse::code`.
    ///
    /// Never reveals secrets or raw credentials (§7: user-visible behaviour).
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateId { .. } => "DUPLICATE_ID",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::ConfigInvalid { .. } => "CONFIG_INVALID",
            Self::IoError { .. } => "IO_ERROR",
            Self::Corrupt { .. } => "CORRUPT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::TimedOut { .. } => "TIMED_OUT",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Unsupported { .. } => "UNSUPPORTED",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(DocbaseError::AuthFailed.code(), "AUTH_FAILED");
        assert_eq!(
            DocbaseError::NotFound { collection: "users".into(), id: "u1".into() }.code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn auth_failed_display_reveals_nothing() {
        let msg = DocbaseError::AuthFailed.to_string();
        assert_eq!(msg, "authentication failed");
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DocbaseError = io_err.into();
        assert!(matches!(err, DocbaseError::IoError { .. }));
    }
}
