//! Capture API capability probe.
//!
//! Browsers expose camera capture through several API vintages. The probe
//! reduces the raw presence flags to a single [`CaptureApi`] in fixed
//! priority order, or `None` when nothing usable exists.

use serde::{Deserialize, Serialize};

/// Vendor prefix of a pre-standard `getUserMedia`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorPrefix {
    /// `navigator.webkitGetUserMedia`.
    Webkit,
    /// `navigator.mozGetUserMedia`.
    Moz,
}

/// A camera capture API the platform can be asked through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureApi {
    /// `navigator.mediaDevices.getUserMedia`, promise based.
    Modern,
    /// Unprefixed callback-style `navigator.getUserMedia`.
    Legacy,
    /// Vendor-prefixed callback-style `getUserMedia`.
    VendorPrefixed(VendorPrefix),
}

impl CaptureApi {
    /// Whether this API accepts the full constraint plan. Older vintages are
    /// only ever asked for "any video".
    #[must_use]
    pub const fn supports_constraint_plan(self) -> bool {
        matches!(self, Self::Modern)
    }

    /// Name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Modern => "mediaDevices.getUserMedia",
            Self::Legacy => "getUserMedia",
            Self::VendorPrefixed(VendorPrefix::Webkit) => "webkitGetUserMedia",
            Self::VendorPrefixed(VendorPrefix::Moz) => "mozGetUserMedia",
        }
    }
}

/// Raw capability signals collected from the host.
///
/// Doubles as the diagnostic payload of an unsupported-API failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureCapabilities {
    /// `navigator.mediaDevices` exists.
    pub has_media_devices: bool,
    /// `navigator.mediaDevices.getUserMedia` is callable.
    pub has_get_user_media: bool,
    /// `navigator.getUserMedia` is callable.
    pub has_legacy_get_user_media: bool,
    /// `navigator.webkitGetUserMedia` is callable.
    pub has_webkit_get_user_media: bool,
    /// `navigator.mozGetUserMedia` is callable.
    pub has_moz_get_user_media: bool,
    /// Platform reports a secure context.
    pub is_secure_context: bool,
    /// Page protocol, e.g. `https:`.
    pub protocol: String,
    /// Page hostname.
    pub hostname: String,
    /// User agent string.
    pub user_agent: String,
}

impl CaptureCapabilities {
    /// Pick the capture API to use, in priority order: modern, legacy,
    /// webkit-prefixed, moz-prefixed.
    #[must_use]
    pub fn probe(&self) -> Option<CaptureApi> {
        if self.has_media_devices && self.has_get_user_media {
            Some(CaptureApi::Modern)
        } else if self.has_legacy_get_user_media {
            Some(CaptureApi::Legacy)
        } else if self.has_webkit_get_user_media {
            Some(CaptureApi::VendorPrefixed(VendorPrefix::Webkit))
        } else if self.has_moz_get_user_media {
            Some(CaptureApi::VendorPrefixed(VendorPrefix::Moz))
        } else {
            None
        }
    }

    /// Serialize the flags for diagnostics.
    #[must_use]
    pub fn diagnostics_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_wins_over_everything() {
        let caps = CaptureCapabilities {
            has_media_devices: true,
            has_get_user_media: true,
            has_legacy_get_user_media: true,
            has_webkit_get_user_media: true,
            ..CaptureCapabilities::default()
        };
        assert_eq!(caps.probe(), Some(CaptureApi::Modern));
    }

    #[test]
    fn media_devices_without_get_user_media_falls_through() {
        let caps = CaptureCapabilities {
            has_media_devices: true,
            has_webkit_get_user_media: true,
            ..CaptureCapabilities::default()
        };
        assert_eq!(
            caps.probe(),
            Some(CaptureApi::VendorPrefixed(VendorPrefix::Webkit))
        );
    }

    #[test]
    fn legacy_precedes_prefixed() {
        let caps = CaptureCapabilities {
            has_legacy_get_user_media: true,
            has_moz_get_user_media: true,
            ..CaptureCapabilities::default()
        };
        assert_eq!(caps.probe(), Some(CaptureApi::Legacy));
    }

    #[test]
    fn moz_is_last_resort() {
        let caps = CaptureCapabilities {
            has_moz_get_user_media: true,
            ..CaptureCapabilities::default()
        };
        assert_eq!(caps.probe(), Some(CaptureApi::VendorPrefixed(VendorPrefix::Moz)));
    }

    #[test]
    fn nothing_present_probes_none() {
        assert_eq!(CaptureCapabilities::default().probe(), None);
    }

    #[test]
    fn only_modern_takes_constraint_plan() {
        assert!(CaptureApi::Modern.supports_constraint_plan());
        assert!(!CaptureApi::Legacy.supports_constraint_plan());
        assert!(!CaptureApi::VendorPrefixed(VendorPrefix::Moz).supports_constraint_plan());
    }

    #[test]
    fn diagnostics_use_camel_case() {
        let caps = CaptureCapabilities {
            hostname: "10.0.0.5".to_string(),
            ..CaptureCapabilities::default()
        };
        let json = caps.diagnostics_json();
        assert!(json.contains("\"hasMediaDevices\": false"));
        assert!(json.contains("\"hostname\": \"10.0.0.5\""));
    }
}
