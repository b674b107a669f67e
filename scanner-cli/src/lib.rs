//! # QR Scan CLI
//!
//! Native host for the QR scan pipeline. A directory of images plays the role
//! of the camera, a tokio timer plays the display refresh, and `--manual`
//! answers the manual-entry prompt. The scan runs through the same
//! [`ScanController`] the browser uses.
//!
//! ## Usage
//!
//! ```bash
//! qr-scan --camera-dir ./frames
//! qr-scan --camera-dir ./frames --mobile --json
//! qr-scan --manual MCH-0042          # no camera: manual fallback
//! qr-scan --image label.png          # still image, no lifecycle
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - command-line arguments parsed with clap
//! - `CliConfig` - resolved configuration, including the `ScannerConfig`
//! - `DirectoryCapture` - image directory as a capture backend
//! - `TokioFrameScheduler` - interval-driven frame scheduling

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod capture;
mod scheduler;

pub use capture::{load_frame, DirectoryCapture, ImageSequenceStream};
pub use scheduler::TokioFrameScheduler;

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use scanner_core::{
    CaptureBackend, FacingMode, FrameDecodeLoop, FrameOutcome, FrameScheduler, ManualEntryPrompt,
    PayloadSource, RqrrDecoder, ScanCallbacks, ScanController, ScanPlatform, ScanState,
    ScannerConfig, ScannerError, VideoSurface,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Camera path failed and no manual code was given.
    #[error("{0}")]
    Scan(String),

    /// Frames exhausted without a detection.
    #[error("No QR code found after {frames} frame(s)")]
    NoCode {
        /// Frames sampled before giving up.
        frames: u64,
    },

    /// Image could not be read.
    #[error("Failed to read image {}: {source}", path.display())]
    Image {
        /// Image path.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// Config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Scanner pipeline error.
    #[error(transparent)]
    Scanner(#[from] ScannerError),
}

/// Command-line arguments for qr-scan.
#[derive(Debug, Clone, Parser)]
#[command(name = "qr-scan")]
#[command(about = "Scan a QR code from a camera directory or still images")]
#[command(version)]
pub struct CliArgs {
    /// Directory of images replayed as camera frames
    #[arg(long, env = "QR_SCAN_CAMERA_DIR")]
    pub camera_dir: Option<PathBuf>,

    /// Present as a mobile device (rear camera, bounded resolution)
    #[arg(long)]
    pub mobile: bool,

    /// Facing mode requested on mobile (environment or user)
    #[arg(long, default_value = "environment", value_parser = parse_facing)]
    pub facing: FacingMode,

    /// Delay between frames in milliseconds
    #[arg(long, default_value = "33")]
    pub frame_interval_ms: u64,

    /// Frames to sample before giving up
    #[arg(long, default_value = "300")]
    pub max_frames: u64,

    /// Retries after a transient camera failure
    #[arg(long, default_value = "1")]
    pub retries: u32,

    /// Code to type in when the camera path fails
    #[arg(long, env = "QR_SCAN_MANUAL_CODE")]
    pub manual: Option<String>,

    /// Scanner configuration JSON file
    #[arg(long, env = "QR_SCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Decode still images instead of running the camera
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_facing(value: &str) -> Result<FacingMode, String> {
    match value {
        "environment" => Ok(FacingMode::Environment),
        "user" => Ok(FacingMode::User),
        other => Err(format!("unknown facing mode '{other}'")),
    }
}

/// Resolved CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Camera directory; `None` means no capture API.
    pub camera_dir: Option<PathBuf>,
    /// Use the mobile candidate plan.
    pub mobile: bool,
    /// Delay between frames.
    pub frame_interval: Duration,
    /// Frames to sample before giving up.
    pub max_frames: u64,
    /// Retries after a transient failure.
    pub retries: u32,
    /// Manual-entry answer.
    pub manual: Option<String>,
    /// Still images to decode.
    pub images: Vec<PathBuf>,
    /// JSON output.
    pub json: bool,
    /// Pipeline configuration.
    pub scanner: ScannerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            camera_dir: None,
            mobile: false,
            frame_interval: Duration::from_millis(33),
            max_frames: 300,
            retries: 1,
            manual: None,
            images: Vec::new(),
            json: false,
            scanner: ScannerConfig::default(),
        }
    }
}

impl TryFrom<CliArgs> for CliConfig {
    type Error = CliError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let mut scanner = match &args.config {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
                    path: path.clone(),
                    source,
                })?;
                ScannerConfig::from_json(&json)?
            }
            None => ScannerConfig::default(),
        };
        scanner.mobile_facing = args.facing;

        Ok(Self {
            camera_dir: args.camera_dir,
            mobile: args.mobile,
            frame_interval: Duration::from_millis(args.frame_interval_ms.max(1)),
            max_frames: args.max_frames.max(1),
            retries: args.retries,
            manual: args.manual,
            images: args.images,
            json: args.json,
            scanner,
        })
    }
}

/// A delivered scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Payload text.
    pub payload: String,
    /// Camera or manual.
    pub source: PayloadSource,
}

impl ScanReport {
    /// Render for stdout.
    #[must_use]
    pub fn render(&self, json: bool) -> String {
        if json {
            serde_json::json!({ "payload": self.payload, "source": self.source }).to_string()
        } else {
            self.payload.clone()
        }
    }
}

/// Answers the manual-entry prompt with a fixed code.
#[derive(Debug, Clone, Default)]
pub struct FixedPrompt {
    answer: Option<String>,
}

impl FixedPrompt {
    /// Prompt that answers `answer`, or cancels when `None`.
    #[must_use]
    pub fn new(answer: Option<String>) -> Self {
        Self { answer }
    }
}

impl ManualEntryPrompt for FixedPrompt {
    fn prompt(&self, message: &str) -> Option<String> {
        tracing::info!("{message} {}", self.answer.as_deref().unwrap_or("<cancelled>"));
        self.answer.clone()
    }
}

/// Decode a still image through the frame decode loop.
///
/// # Errors
///
/// Returns an error if the image cannot be read or sampled.
pub async fn scan_image(path: &std::path::Path) -> Result<Option<String>, CliError> {
    let stream = ImageSequenceStream::new(vec![load_frame(path)?]);
    if let Err(err) = stream.start_playback().await {
        return Err(CliError::Scan(err.to_string()));
    }

    let mut decode_loop = FrameDecodeLoop::new(Box::new(RqrrDecoder));
    match decode_loop.tick(&stream)? {
        FrameOutcome::Decoded(payload) => Ok(Some(payload)),
        FrameOutcome::NoCode | FrameOutcome::NotReady => Ok(None),
    }
}

/// Run one scan through the lifecycle controller.
///
/// Must be called within a [`tokio::task::LocalSet`].
///
/// # Errors
///
/// Returns the camera failure message when the camera path fails and manual
/// entry is unavailable, or [`CliError::NoCode`] when `max_frames` pass
/// without a detection.
pub async fn run(config: &CliConfig) -> Result<ScanReport, CliError> {
    let wake = Rc::new(Notify::new());
    let last_error = Rc::new(RefCell::new(None::<String>));

    let on_success = Rc::clone(&wake);
    let on_error = Rc::clone(&wake);
    let errors = Rc::clone(&last_error);
    let callbacks = ScanCallbacks::new(
        move |payload| {
            tracing::info!("Scanned {} byte payload", payload.len());
            on_success.notify_one();
        },
        move |message| {
            tracing::warn!("Camera error: {message}");
            *errors.borrow_mut() = Some(message.to_string());
            on_error.notify_one();
        },
    )
    .with_on_close(|| tracing::info!("Scanner closed without a result"));

    let platform = ScanPlatform::new(
        Rc::new(DirectoryCapture::new(config.camera_dir.clone(), config.mobile))
            as Rc<dyn CaptureBackend>,
        Rc::new(TokioFrameScheduler::new(config.frame_interval)) as Rc<dyn FrameScheduler>,
        Rc::new(FixedPrompt::new(config.manual.clone())) as Rc<dyn ManualEntryPrompt>,
    );
    let controller = ScanController::new(platform, config.scanner.clone(), callbacks);

    controller.mount().await;

    let mut retries = config.retries;
    while matches!(controller.state(), ScanState::TransientError(_)) && retries > 0 {
        retries -= 1;
        tokio::time::sleep(controller.config().retry_delay()).await;
        controller.retry().await;
    }

    let budget = config.frame_interval * u32::try_from(config.max_frames).unwrap_or(u32::MAX);
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        match controller.state() {
            ScanState::Success(payload) => {
                return Ok(ScanReport {
                    payload: payload.text,
                    source: payload.source,
                })
            }
            state if state.is_failure() => {
                if controller.enter_manually() {
                    continue;
                }
                let message = last_error
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| state.status_text().to_string());
                controller.close();
                return Err(CliError::Scan(message));
            }
            _ => {}
        }

        if tokio::time::timeout_at(deadline, wake.notified()).await.is_err() {
            let frames = controller.frames_sampled();
            tracing::info!("Giving up after {frames} frame(s)");
            controller.close();
            return Err(CliError::NoCode { frames });
        }
    }
}
