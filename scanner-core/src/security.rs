//! Secure-context policy.
//!
//! Camera access is always attempted; the platform's own permission check is
//! authoritative. This module only decides what to log. The private-network
//! allowance is a heuristic and carries no security guarantee.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::capability::CaptureCapabilities;

/// Where the page is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostClass {
    /// `localhost`, `*.localhost` or a loopback address.
    Localhost,
    /// RFC 1918 address (10/8, 172.16/12, 192.168/16).
    PrivateNetwork,
    /// Anything else.
    Public,
}

impl HostClass {
    /// Classify a hostname.
    #[must_use]
    pub fn classify(hostname: &str) -> Self {
        let host = hostname.trim_start_matches('[').trim_end_matches(']');

        if host.eq_ignore_ascii_case("localhost") || host.to_ascii_lowercase().ends_with(".localhost")
        {
            return Self::Localhost;
        }

        match host.parse::<IpAddr>() {
            Ok(ip) if ip.is_loopback() => Self::Localhost,
            Ok(IpAddr::V4(v4)) if v4.is_private() => Self::PrivateNetwork,
            _ => Self::Public,
        }
    }
}

/// What the policy has to say about the current context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAdvisory {
    /// Secure context; nothing to report.
    Secure,
    /// Insecure, but localhost or private network. Usually permitted.
    LocalDevelopment,
    /// Insecure public origin; the camera may be refused.
    InsecureWarning,
}

/// Secure-context signal combined with the host classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    /// Platform-reported secure context.
    pub secure_context: bool,
    /// Host classification.
    pub host: HostClass,
}

impl SecurityAssessment {
    /// Assess a context from raw signals.
    #[must_use]
    pub fn new(secure_context: bool, hostname: &str) -> Self {
        Self {
            secure_context,
            host: HostClass::classify(hostname),
        }
    }

    /// Assess the context described by probed capabilities.
    #[must_use]
    pub fn from_capabilities(caps: &CaptureCapabilities) -> Self {
        Self::new(caps.is_secure_context, &caps.hostname)
    }

    /// Secure context, or localhost which browsers treat as secure.
    #[must_use]
    pub fn is_effectively_secure(&self) -> bool {
        self.secure_context || self.host == HostClass::Localhost
    }

    /// Policy verdict. Never blocks access.
    #[must_use]
    pub fn advisory(&self) -> SecurityAdvisory {
        if self.secure_context {
            SecurityAdvisory::Secure
        } else if matches!(self.host, HostClass::Localhost | HostClass::PrivateNetwork) {
            SecurityAdvisory::LocalDevelopment
        } else {
            SecurityAdvisory::InsecureWarning
        }
    }

    /// Emit the advisory through tracing.
    pub fn log(&self, hostname: &str) {
        match self.advisory() {
            SecurityAdvisory::Secure => {
                tracing::debug!("Secure context on {hostname}");
            }
            SecurityAdvisory::LocalDevelopment => {
                tracing::info!(
                    "Using camera on {hostname} ({:?}) without a secure context",
                    self.host
                );
            }
            SecurityAdvisory::InsecureWarning => {
                tracing::warn!(
                    "Camera may not work on insecure origin {hostname} outside localhost/local network"
                );
            }
        }
    }
}
