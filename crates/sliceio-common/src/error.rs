//! Error types for SliceIO
//!
//! This module defines the common error taxonomy used throughout the system.

use crate::types::{PhotoId, SliceIndex, VolumeId};
use thiserror::Error;

/// Common result type for SliceIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for SliceIO
#[derive(Debug, Error)]
pub enum Error {
    // Terminal, user-actionable failures
    #[error("volume not found: {0}")]
    VolumeNotFound(VolumeId),

    #[error("photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("forbidden: volume {0} is private")]
    Forbidden(VolumeId),

    #[error("slice index {slice} out of bounds for volume with {slice_count} slices")]
    SliceOutOfBounds { slice: SliceIndex, slice_count: u32 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Infrastructure failures on the synchronous path
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    // Inference
    #[error("inference failed: {0}")]
    Compute(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a cache-unavailable error
    pub fn cache_unavailable(msg: impl ToString) -> Self {
        Self::CacheUnavailable(msg.to_string())
    }

    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl ToString) -> Self {
        Self::StoreUnavailable(msg.to_string())
    }

    /// Create an internal error
    pub fn internal(msg: impl ToString) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::VolumeNotFound(_) | Self::PhotoNotFound(_))
    }

    /// Check if this is a transient infrastructure failure
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::CacheUnavailable(_) | Self::StoreUnavailable(_))
    }

    /// Get the HTTP status code this error maps to at the gateway.
    ///
    /// Infrastructure failures surface as a generic internal error to the
    /// caller; the full context goes to the log, keyed by the request id.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::SliceOutOfBounds { .. } => 400,
            Self::Forbidden(_) => 403,
            Self::VolumeNotFound(_) | Self::PhotoNotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::CacheUnavailable(_)
            | Self::StoreUnavailable(_)
            | Self::Compute(_)
            | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found() {
        assert!(Error::VolumeNotFound(VolumeId::new()).is_not_found());
        assert!(Error::PhotoNotFound(PhotoId::new()).is_not_found());
        assert!(!Error::Forbidden(VolumeId::new()).is_not_found());
    }

    #[test]
    fn test_cache_failure_distinct_from_not_found() {
        let err = Error::cache_unavailable("connection refused");
        assert!(err.is_unavailable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::Forbidden(VolumeId::new()).http_status_code(), 403);
        assert_eq!(
            Error::VolumeNotFound(VolumeId::new()).http_status_code(),
            404
        );
        assert_eq!(
            Error::SliceOutOfBounds {
                slice: 10,
                slice_count: 10
            }
            .http_status_code(),
            400
        );
        assert_eq!(Error::conflict("duplicate photo").http_status_code(), 409);
        assert_eq!(Error::cache_unavailable("down").http_status_code(), 500);
    }
}
