//! # QR Scan Core
//!
//! Core QR scanning pipeline: camera negotiation, per-frame decoding and the
//! scan lifecycle. Contains no I/O; every platform facility (camera access,
//! frame scheduling, pixel sampling, text prompts) is reached through the
//! traits in [`platform`]. Compiles to WASM for the browser host.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ScanController                 │
//! │   Uninitialized → Initializing → Scanning   │
//! │        ↘ failure ↗ retry    ↘ Success       │
//! ├──────────────────────┬──────────────────────┤
//! │  Negotiator          │  FrameDecodeLoop     │
//! │  - capability probe  │  - readiness guard   │
//! │  - constraint plan   │  - surface resizing  │
//! │  - failure mapping   │  - dual polarity     │
//! ├──────────────────────┴──────────────────────┤
//! │  platform traits: CaptureBackend,           │
//! │  CameraStream, FrameScheduler, Prompt       │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod config;
pub mod constraints;
pub mod decode;
pub mod device;
pub mod error;
pub mod failure;
pub mod lifecycle;
pub mod negotiator;
pub mod platform;
pub mod security;
pub mod session;
pub mod state;

pub use capability::{CaptureApi, CaptureCapabilities, VendorPrefix};
pub use config::ScannerConfig;
pub use constraints::{CaptureConstraintCandidate, FacingMode, Resolution};
pub use decode::{FrameDecodeLoop, FrameOutcome, QrDecoder, RqrrDecoder, SampleSurface};
pub use device::{Browser, DeviceClass, DeviceProfile};
pub use error::{NativeError, ScannerError, ScannerResult};
pub use failure::{FailureKind, PermissionCause, ScanFailure, TransientCause};
pub use lifecycle::{ScanCallbacks, ScanController};
pub use negotiator::Negotiator;
pub use platform::{
    CameraStream, CaptureBackend, FrameHandle, FrameScheduler, FrameTask, ManualEntryPrompt,
    MediaTracks, ReadyState, ScanPlatform, VideoSurface,
};
pub use security::{HostClass, SecurityAdvisory, SecurityAssessment};
pub use session::{CameraSession, SessionId};
pub use state::{DecodedPayload, PayloadSource, ScanState};

/// Scanner core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
