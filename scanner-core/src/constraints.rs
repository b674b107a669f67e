//! Capture constraint candidates.
//!
//! A candidate is one request shape handed to the platform when asking for a
//! camera stream. Candidates are tried most-specific-first; the last one in
//! every plan is "any video", which only fails when no camera can be opened
//! at all.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScannerConfig;
use crate::device::DeviceClass;

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user.
    User,
    /// Rear camera, facing away from the user.
    #[default]
    Environment,
}

impl FacingMode {
    /// The platform's string form of this facing mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pixel resolution hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// 640x480.
    pub const VGA: Self = Self::new(640, 480);
    /// 1280x720.
    pub const HD: Self = Self::new(1280, 720);

    /// Create a resolution.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One concrete request shape for opening a camera stream.
///
/// Immutable once constructed. A candidate with neither a facing mode nor a
/// resolution asks for any video device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraintCandidate {
    facing: Option<FacingMode>,
    ideal: Option<Resolution>,
}

impl CaptureConstraintCandidate {
    /// Create a candidate from optional facing and resolution hints.
    #[must_use]
    pub const fn new(facing: Option<FacingMode>, ideal: Option<Resolution>) -> Self {
        Self { facing, ideal }
    }

    /// The least constrained candidate: any video device.
    #[must_use]
    pub const fn any_video() -> Self {
        Self::new(None, None)
    }

    /// Requested facing mode, if any.
    #[must_use]
    pub const fn facing(&self) -> Option<FacingMode> {
        self.facing
    }

    /// Requested ideal resolution, if any.
    #[must_use]
    pub const fn ideal_resolution(&self) -> Option<Resolution> {
        self.ideal
    }

    /// Whether this candidate places no constraints on the video device.
    #[must_use]
    pub const fn is_any_video(&self) -> bool {
        self.facing.is_none() && self.ideal.is_none()
    }

    /// Render the candidate in `getUserMedia` constraint form.
    ///
    /// ```text
    /// {"video": true}
    /// {"video": {"facingMode": "environment", "width": {"ideal": 640}, "height": {"ideal": 480}}}
    /// ```
    #[must_use]
    pub fn to_media_constraints(&self) -> serde_json::Value {
        if self.is_any_video() {
            return serde_json::json!({ "video": true });
        }

        let mut video = serde_json::Map::new();
        if let Some(facing) = self.facing {
            video.insert("facingMode".to_string(), facing.as_str().into());
        }
        if let Some(res) = self.ideal {
            video.insert("width".to_string(), serde_json::json!({ "ideal": res.width }));
            video.insert(
                "height".to_string(),
                serde_json::json!({ "ideal": res.height }),
            );
        }
        serde_json::json!({ "video": video })
    }

    /// Build the ordered candidate list for a device class.
    ///
    /// Mobile: facing + bounded resolution, facing only, bounded resolution
    /// only, any video. Desktop: high resolution, moderate resolution, any
    /// video.
    #[must_use]
    pub fn plan(class: DeviceClass, config: &ScannerConfig) -> Vec<Self> {
        match class {
            DeviceClass::Mobile => vec![
                Self::new(Some(config.mobile_facing), Some(config.mobile_resolution)),
                Self::new(Some(config.mobile_facing), None),
                Self::new(None, Some(config.mobile_resolution)),
                Self::any_video(),
            ],
            DeviceClass::Desktop => vec![
                Self::new(None, Some(config.desktop_resolution)),
                Self::new(None, Some(config.desktop_fallback_resolution)),
                Self::any_video(),
            ],
        }
    }
}

impl fmt::Display for CaptureConstraintCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.facing, self.ideal) {
            (None, None) => f.write_str("any video"),
            (Some(facing), None) => write!(f, "facing={facing}"),
            (None, Some(res)) => write!(f, "ideal={res}"),
            (Some(facing), Some(res)) => write!(f, "facing={facing} ideal={res}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_plan_is_most_specific_first() {
        let plan = CaptureConstraintCandidate::plan(DeviceClass::Mobile, &ScannerConfig::default());
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].facing(), Some(FacingMode::Environment));
        assert_eq!(plan[0].ideal_resolution(), Some(Resolution::VGA));
        assert_eq!(plan[1].facing(), Some(FacingMode::Environment));
        assert_eq!(plan[1].ideal_resolution(), None);
        assert_eq!(plan[2].facing(), None);
        assert_eq!(plan[2].ideal_resolution(), Some(Resolution::VGA));
        assert!(plan[3].is_any_video());
    }

    #[test]
    fn desktop_plan_steps_down_resolution() {
        let plan =
            CaptureConstraintCandidate::plan(DeviceClass::Desktop, &ScannerConfig::default());
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].ideal_resolution(), Some(Resolution::HD));
        assert_eq!(plan[1].ideal_resolution(), Some(Resolution::VGA));
        assert!(plan[2].is_any_video());
        assert!(plan.iter().all(|c| c.facing().is_none()));
    }

    #[test]
    fn any_video_renders_as_boolean() {
        let json = CaptureConstraintCandidate::any_video().to_media_constraints();
        assert_eq!(json, serde_json::json!({ "video": true }));
    }

    #[test]
    fn full_candidate_renders_ideal_hints() {
        let candidate =
            CaptureConstraintCandidate::new(Some(FacingMode::Environment), Some(Resolution::VGA));
        let json = candidate.to_media_constraints();
        assert_eq!(json["video"]["facingMode"], "environment");
        assert_eq!(json["video"]["width"]["ideal"], 640);
        assert_eq!(json["video"]["height"]["ideal"], 480);
    }

    #[test]
    fn display_is_compact() {
        let candidate = CaptureConstraintCandidate::new(Some(FacingMode::User), None);
        assert_eq!(candidate.to_string(), "facing=user");
        assert_eq!(
            CaptureConstraintCandidate::any_video().to_string(),
            "any video"
        );
    }

    #[test]
    fn resolution_emptiness() {
        assert!(Resolution::new(0, 480).is_empty());
        assert!(!Resolution::HD.is_empty());
    }
}
