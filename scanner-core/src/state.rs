//! Scan lifecycle states.

use serde::{Deserialize, Serialize};

use crate::capability::CaptureCapabilities;
use crate::failure::{FailureKind, PermissionCause, ScanFailure};

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadSource {
    /// Decoded from a camera frame.
    Camera,
    /// Typed in by the user.
    Manual,
}

/// A QR payload, handed to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    /// The payload text.
    pub text: String,
    /// How it was obtained.
    pub source: PayloadSource,
}

impl DecodedPayload {
    /// Payload decoded from a frame.
    #[must_use]
    pub fn camera(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PayloadSource::Camera,
        }
    }

    /// Payload typed by the user.
    #[must_use]
    pub fn manual(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PayloadSource::Manual,
        }
    }
}

/// Exactly one of these holds at a time per controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    /// Not mounted, or closed.
    #[default]
    Uninitialized,
    /// Negotiating a camera stream.
    Initializing,
    /// Decode loop running.
    Scanning,
    /// Camera access refused.
    PermissionDenied(PermissionCause),
    /// No camera present.
    DeviceUnavailable,
    /// No usable capture API.
    ApiUnsupported(Box<CaptureCapabilities>),
    /// Retryable failure with its user-facing message.
    TransientError(String),
    /// A payload was delivered.
    Success(DecodedPayload),
}

impl ScanState {
    /// State entered for a classified failure. `message` is only kept for
    /// transient failures.
    #[must_use]
    pub fn from_failure(failure: &ScanFailure, message: &str) -> Self {
        match failure {
            ScanFailure::PermissionDenied(cause) => Self::PermissionDenied(*cause),
            ScanFailure::DeviceUnavailable => Self::DeviceUnavailable,
            ScanFailure::ApiUnsupported(caps) => Self::ApiUnsupported(caps.clone()),
            ScanFailure::Transient { .. } => Self::TransientError(message.to_string()),
        }
    }

    /// Failure kind, if this is a failure state.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::PermissionDenied(_) => Some(FailureKind::PermissionDenied),
            Self::DeviceUnavailable => Some(FailureKind::DeviceUnavailable),
            Self::ApiUnsupported(_) => Some(FailureKind::ApiUnsupported),
            Self::TransientError(_) => Some(FailureKind::TransientError),
            _ => None,
        }
    }

    /// Whether this is one of the four failure states.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.failure_kind().is_some()
    }

    /// Stable state name, as exposed to hosts.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Scanning => "scanning",
            Self::PermissionDenied(_) => "permission_denied",
            Self::DeviceUnavailable => "device_unavailable",
            Self::ApiUnsupported(_) => "api_unsupported",
            Self::TransientError(_) => "transient_error",
            Self::Success(_) => "success",
        }
    }

    /// One-line status for the scanner UI.
    #[must_use]
    pub fn status_text(&self) -> &str {
        match self {
            Self::Uninitialized => "Initializing scanner...",
            Self::Initializing => "Initializing camera...",
            Self::Scanning => "Point your camera at a QR code",
            Self::PermissionDenied(_) => "Camera permission is required to scan QR codes",
            Self::DeviceUnavailable => "No camera found on this device",
            Self::ApiUnsupported(_) => "Camera not supported on this browser",
            Self::TransientError(message) => message,
            Self::Success(_) => "QR code scanned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::TransientCause;

    #[test]
    fn failure_states_map_one_to_one() {
        let failures = [
            ScanFailure::PermissionDenied(PermissionCause::Denied),
            ScanFailure::DeviceUnavailable,
            ScanFailure::ApiUnsupported(Box::default()),
            ScanFailure::Transient {
                cause: TransientCause::InUse,
                detail: "NotReadableError: busy".to_string(),
            },
        ];
        for failure in &failures {
            let state = ScanState::from_failure(failure, "msg");
            assert_eq!(state.failure_kind(), Some(failure.kind()));
        }
    }

    #[test]
    fn transient_state_shows_its_message() {
        let state = ScanState::TransientError("Camera is busy".to_string());
        assert_eq!(state.status_text(), "Camera is busy");
        assert!(state.is_failure());
    }

    #[test]
    fn non_failure_states() {
        for state in [
            ScanState::Uninitialized,
            ScanState::Initializing,
            ScanState::Scanning,
            ScanState::Success(DecodedPayload::camera("MCH-0042")),
        ] {
            assert!(!state.is_failure(), "{} is not a failure", state.name());
        }
    }

    #[test]
    fn payload_source_serializes_lowercase() {
        let json = serde_json::to_string(&DecodedPayload::manual("X")).expect("serialize");
        assert_eq!(json, r#"{"text":"X","source":"manual"}"#);
    }
}
