//! Classified camera acquisition failures.
//!
//! Every native error is mapped onto exactly one of four kinds. Unknown
//! reasons default to a transient failure so the user is always offered a
//! retry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CaptureCapabilities;
use crate::device::{Browser, DeviceProfile};
use crate::error::NativeError;

/// The four failure kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// User or OS refused camera access.
    PermissionDenied,
    /// No physical camera found.
    DeviceUnavailable,
    /// No usable capture API.
    ApiUnsupported,
    /// Busy, unsatisfiable constraints, interrupted, or unknown.
    TransientError,
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCause {
    /// The permission prompt was declined or is blocked.
    Denied,
    /// The platform blocked access for security reasons (e.g. insecure origin).
    SecurityBlocked,
}

/// Cause of a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientCause {
    /// Camera is held by another application.
    InUse,
    /// No device satisfies the requested constraints.
    Overconstrained,
    /// The request or playback was interrupted.
    Interrupted,
    /// The capture API was called incorrectly or misbehaved.
    ApiError,
    /// Unrecognised reason.
    Unknown,
}

/// A classified camera acquisition failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanFailure {
    /// User or OS refused camera access.
    #[error("camera permission denied ({0:?})")]
    PermissionDenied(PermissionCause),

    /// No camera present.
    #[error("no camera device available")]
    DeviceUnavailable,

    /// No capture API, or the device reports capture as unsupported.
    /// Carries the probed capability flags for diagnostics.
    #[error("camera capture not supported")]
    ApiUnsupported(Box<CaptureCapabilities>),

    /// Recoverable by retrying.
    #[error("transient camera failure ({cause:?}): {detail}")]
    Transient {
        /// Classified cause.
        cause: TransientCause,
        /// Platform-provided detail.
        detail: String,
    },
}

impl ScanFailure {
    /// Classify a native error reported by the capture API.
    ///
    /// Reason codes are matched first; for unrecognised codes the message is
    /// searched for "permission" and "not found" style wording.
    #[must_use]
    pub fn classify(error: &NativeError, capabilities: &CaptureCapabilities) -> Self {
        match error.name.as_str() {
            "NotAllowedError" | "PermissionDeniedError" => {
                Self::PermissionDenied(PermissionCause::Denied)
            }
            "SecurityError" => Self::PermissionDenied(PermissionCause::SecurityBlocked),
            "NotFoundError" | "DevicesNotFoundError" => Self::DeviceUnavailable,
            "NotSupportedError" => Self::ApiUnsupported(Box::new(capabilities.clone())),
            "NotReadableError" | "TrackStartError" => Self::transient(TransientCause::InUse, error),
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                Self::transient(TransientCause::Overconstrained, error)
            }
            "AbortError" => Self::transient(TransientCause::Interrupted, error),
            "TypeError" => Self::transient(TransientCause::ApiError, error),
            _ => Self::classify_message(error),
        }
    }

    fn classify_message(error: &NativeError) -> Self {
        let message = error.message.to_ascii_lowercase();
        if message.contains("permission") || message.contains("denied") {
            Self::PermissionDenied(PermissionCause::Denied)
        } else if message.contains("not found") || message.contains("no device") {
            Self::DeviceUnavailable
        } else {
            Self::transient(TransientCause::Unknown, error)
        }
    }

    fn transient(cause: TransientCause, error: &NativeError) -> Self {
        Self::Transient {
            cause,
            detail: error.to_string(),
        }
    }

    /// The payload-free kind of this failure.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied(_) => FailureKind::PermissionDenied,
            Self::DeviceUnavailable => FailureKind::DeviceUnavailable,
            Self::ApiUnsupported(_) => FailureKind::ApiUnsupported,
            Self::Transient { .. } => FailureKind::TransientError,
        }
    }

    /// Whether typing the code by hand is the suggested way forward.
    #[must_use]
    pub const fn manual_entry_suggested(&self) -> bool {
        matches!(self, Self::ApiUnsupported(_) | Self::DeviceUnavailable)
    }

    /// Human-readable message shown to the user and passed to `onError`.
    #[must_use]
    pub fn user_message(&self, profile: &DeviceProfile) -> String {
        match self {
            Self::PermissionDenied(PermissionCause::Denied) => {
                "Camera permission denied. Please allow camera access and try again.".to_string()
            }
            Self::PermissionDenied(PermissionCause::SecurityBlocked) => {
                "Camera access blocked for security reasons. Try using HTTPS or allow insecure camera access in your browser settings.".to_string()
            }
            Self::DeviceUnavailable => {
                "No camera found on this device. Please connect a camera and try again.".to_string()
            }
            Self::ApiUnsupported(caps) if caps.probe().is_none() => {
                "Camera API not available on this browser.\n\nPlease check the browser console for details.\n\nTry:\n- Updating your browser\n- Using Chrome, Firefox, or Edge\n- Checking browser settings for camera permissions".to_string()
            }
            Self::ApiUnsupported(_) => unsupported_on_device(profile),
            Self::Transient { cause, .. } => match cause {
                TransientCause::InUse => "Camera is already in use by another application. Close other camera apps and try again.",
                TransientCause::Overconstrained => "Camera constraints cannot be satisfied. Please try again.",
                TransientCause::Interrupted => "Camera access was interrupted. Please try again.",
                TransientCause::ApiError => "Camera API error. Try refreshing the page or using a different browser.",
                TransientCause::Unknown => "Failed to access camera. Please try again.",
            }
            .to_string(),
        }
    }
}

fn unsupported_on_device(profile: &DeviceProfile) -> String {
    if profile.is_mobile() {
        match profile.browser {
            Browser::Safari => {
                "Camera not supported. Try updating Safari or use Chrome on mobile.".to_string()
            }
            Browser::Chrome => {
                "Camera not supported. Try updating Chrome or check camera permissions."
                    .to_string()
            }
            _ => "Camera not supported on this mobile browser. Try Chrome or Safari.".to_string(),
        }
    } else {
        format!(
            "Camera not supported in {}. Try Chrome, Firefox, or Edge.",
            profile.browser.name()
        )
    }
}
