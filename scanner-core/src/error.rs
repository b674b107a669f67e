//! Error types for scanner operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for scanner operations.
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Errors that can occur inside the scan pipeline itself.
///
/// Camera acquisition failures are not represented here; they are classified
/// into [`crate::ScanFailure`] and surfaced through the lifecycle callbacks.
#[derive(Debug, Error)]
pub enum ScannerError {
    /// Sampled pixel data does not match the surface dimensions.
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The platform could not copy the current video frame.
    #[error("Frame sampling failed: {0}")]
    Sampling(String),

    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration JSON could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An error reported by the host platform's media APIs.
///
/// `name` carries the platform's reason code (for browsers the `DOMException`
/// name such as `NotAllowedError`), `message` the free-form description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct NativeError {
    /// Reason code reported by the platform.
    pub name: String,
    /// Human-readable description from the platform.
    pub message: String,
}

impl NativeError {
    /// Create a native error from a reason code and message.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an abort of an in-flight operation.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.name == "AbortError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_error_displays_name_and_message() {
        let err = NativeError::new("NotAllowedError", "Permission denied");
        assert_eq!(err.to_string(), "NotAllowedError: Permission denied");
    }

    #[test]
    fn abort_detection_uses_reason_code() {
        assert!(NativeError::new("AbortError", "play() interrupted").is_abort());
        assert!(!NativeError::new("NotReadableError", "aborted").is_abort());
    }

    #[test]
    fn invalid_frame_data_message() {
        let err = ScannerError::InvalidFrameData {
            expected: 64,
            actual: 10,
        };
        assert_eq!(
            err.to_string(),
            "Invalid frame data: expected 64 bytes, got 10"
        );
    }
}
