//! Scanner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constraints::{FacingMode, Resolution};
use crate::error::{ScannerError, ScannerResult};

/// Tunables for camera negotiation and the manual fallback.
///
/// Hosts pass this as JSON (`camelCase` keys); missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannerConfig {
    /// Bounded resolution requested on mobile devices.
    pub mobile_resolution: Resolution,
    /// Facing mode requested on mobile devices.
    pub mobile_facing: FacingMode,
    /// First resolution requested on desktop.
    pub desktop_resolution: Resolution,
    /// Second resolution requested on desktop.
    pub desktop_fallback_resolution: Resolution,
    /// Text shown by the manual-entry prompt.
    pub manual_entry_prompt: String,
    /// Delay hosts wait after releasing the camera before a retry.
    pub retry_delay_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mobile_resolution: Resolution::VGA,
            mobile_facing: FacingMode::Environment,
            desktop_resolution: Resolution::HD,
            desktop_fallback_resolution: Resolution::VGA,
            manual_entry_prompt: "Enter QR code data manually:".to_string(),
            retry_delay_ms: 100,
        }
    }
}

impl ScannerConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> ScannerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending field.
    pub fn validate(&self) -> ScannerResult<()> {
        let resolutions = [
            ("mobileResolution", self.mobile_resolution),
            ("desktopResolution", self.desktop_resolution),
            ("desktopFallbackResolution", self.desktop_fallback_resolution),
        ];
        for (field, res) in resolutions {
            if res.is_empty() {
                return Err(ScannerError::Config(format!(
                    "{field} must be non-zero, got {res}"
                )));
            }
        }
        if self.manual_entry_prompt.trim().is_empty() {
            return Err(ScannerError::Config(
                "manualEntryPrompt must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry delay as a duration.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
