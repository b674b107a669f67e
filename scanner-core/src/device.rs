//! Device and browser classification from the user agent.

use serde::{Deserialize, Serialize};

/// Tokens that mark a user agent as mobile (matched case-insensitively).
const MOBILE_TOKENS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Coarse device class used to pick a constraint plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Phones and tablets; prefer the rear camera.
    Mobile,
    /// Everything else.
    Desktop,
}

/// Browser family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Browser {
    /// Chrome / Chromium.
    Chrome,
    /// Firefox.
    Firefox,
    /// Safari.
    Safari,
    /// Edge.
    Edge,
    /// Opera.
    Opera,
    /// Anything unrecognised.
    Unknown,
}

impl Browser {
    /// Detect the browser family from a user agent string.
    ///
    /// Edge and Opera advertise "Chrome" as well, so they are checked first.
    #[must_use]
    pub fn detect(user_agent: &str) -> Self {
        if user_agent.contains("Edg") {
            Self::Edge
        } else if user_agent.contains("OPR") || user_agent.contains("Opera") {
            Self::Opera
        } else if user_agent.contains("Chrome") || user_agent.contains("CriOS") {
            Self::Chrome
        } else if user_agent.contains("Firefox") || user_agent.contains("FxiOS") {
            Self::Firefox
        } else if user_agent.contains("Safari") {
            Self::Safari
        } else {
            Self::Unknown
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chrome => "Chrome",
            Self::Firefox => "Firefox",
            Self::Safari => "Safari",
            Self::Edge => "Edge",
            Self::Opera => "Opera",
            Self::Unknown => "Unknown",
        }
    }
}

/// What the scanner knows about the device it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Mobile or desktop.
    pub class: DeviceClass,
    /// iPhone, iPad or iPod.
    pub is_ios: bool,
    /// Android device.
    pub is_android: bool,
    /// Browser family.
    pub browser: Browser,
}

impl DeviceProfile {
    /// Classify a user agent string.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        let lowered = user_agent.to_ascii_lowercase();
        let is_mobile = MOBILE_TOKENS.iter().any(|token| lowered.contains(token));

        Self {
            class: if is_mobile {
                DeviceClass::Mobile
            } else {
                DeviceClass::Desktop
            },
            is_ios: ["iPad", "iPhone", "iPod"]
                .iter()
                .any(|token| user_agent.contains(token)),
            is_android: user_agent.contains("Android"),
            browser: Browser::detect(user_agent),
        }
    }

    /// Whether this is a mobile device.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.class == DeviceClass::Mobile
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::from_user_agent("")
    }
}
