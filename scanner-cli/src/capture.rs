//! File-backed camera.
//!
//! A directory of still images stands in for a camera: opening it loads every
//! readable image (sorted by file name) and playback cycles through them, one
//! image per sampled frame.

use std::cell::Cell;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::RgbaImage;
use scanner_core::{
    CameraStream, CaptureApi, CaptureBackend, CaptureCapabilities, CaptureConstraintCandidate,
    MediaTracks, NativeError, ReadyState, SampleSurface, ScannerError, ScannerResult,
    VideoSurface,
};

use crate::CliError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

const DESKTOP_AGENT: &str = concat!("qr-scan/", env!("CARGO_PKG_VERSION"), " (native)");
const MOBILE_AGENT: &str = concat!("qr-scan/", env!("CARGO_PKG_VERSION"), " (Linux; Android) Mobile");

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn io_native(err: &io::Error, path: &Path) -> NativeError {
    let name = match err.kind() {
        io::ErrorKind::NotFound => "NotFoundError",
        io::ErrorKind::PermissionDenied => "NotAllowedError",
        _ => "NotReadableError",
    };
    NativeError::new(name, format!("{}: {err}", path.display()))
}

/// Load one image as RGBA.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_frame(path: &Path) -> Result<RgbaImage, CliError> {
    let image = image::open(path).map_err(|source| CliError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgba8())
}

/// [`CaptureBackend`] over an optional image directory.
///
/// Without a directory no capture API is reported, like a browser without
/// `getUserMedia`.
#[derive(Debug, Clone)]
pub struct DirectoryCapture {
    dir: Option<PathBuf>,
    mobile: bool,
}

impl DirectoryCapture {
    /// Create a capture backend. `mobile` selects the mobile candidate plan.
    #[must_use]
    pub fn new(dir: Option<PathBuf>, mobile: bool) -> Self {
        Self { dir, mobile }
    }

    fn load_frames(dir: &Path) -> Result<Vec<RgbaImage>, NativeError> {
        let entries = std::fs::read_dir(dir).map_err(|e| io_native(&e, dir))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        let frames: Vec<RgbaImage> = paths
            .iter()
            .filter_map(|path| match load_frame(path) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!("Skipping unreadable frame: {err}");
                    None
                }
            })
            .collect();

        if frames.is_empty() {
            return Err(NativeError::new(
                "NotFoundError",
                format!("no image frames in {}", dir.display()),
            ));
        }
        Ok(frames)
    }
}

#[async_trait(?Send)]
impl CaptureBackend for DirectoryCapture {
    fn capabilities(&self) -> CaptureCapabilities {
        let available = self.dir.is_some();
        CaptureCapabilities {
            has_media_devices: available,
            has_get_user_media: available,
            is_secure_context: true,
            protocol: "file:".to_string(),
            hostname: "localhost".to_string(),
            user_agent: if self.mobile { MOBILE_AGENT } else { DESKTOP_AGENT }.to_string(),
            ..CaptureCapabilities::default()
        }
    }

    async fn open(
        &self,
        api: CaptureApi,
        candidate: &CaptureConstraintCandidate,
    ) -> Result<Box<dyn CameraStream>, NativeError> {
        let dir = self
            .dir
            .as_deref()
            .ok_or_else(|| NativeError::new("NotSupportedError", "no camera directory"))?;
        tracing::debug!("Opening {} via {} ({candidate})", dir.display(), api.name());

        let frames = Self::load_frames(dir)?;
        tracing::info!("Camera directory {} has {} frame(s)", dir.display(), frames.len());
        Ok(Box::new(ImageSequenceStream::new(frames)))
    }
}

/// Frames replayed in order, cycling at the end.
#[derive(Debug)]
pub struct ImageSequenceStream {
    frames: Vec<RgbaImage>,
    cursor: Cell<usize>,
    playing: Cell<bool>,
    stopped: Cell<bool>,
}

impl ImageSequenceStream {
    /// Wrap pre-loaded frames. Playback has not started.
    #[must_use]
    pub fn new(frames: Vec<RgbaImage>) -> Self {
        Self {
            frames,
            cursor: Cell::new(0),
            playing: Cell::new(false),
            stopped: Cell::new(false),
        }
    }

    fn current(&self) -> Option<&RgbaImage> {
        self.frames.get(self.cursor.get())
    }

    fn advance(&self) {
        if !self.frames.is_empty() {
            self.cursor.set((self.cursor.get() + 1) % self.frames.len());
        }
    }
}

impl MediaTracks for ImageSequenceStream {
    fn live_video_tracks(&self) -> usize {
        usize::from(!self.stopped.get() && !self.frames.is_empty())
    }

    fn stop_tracks(&self) {
        self.stopped.set(true);
        self.playing.set(false);
    }
}

#[async_trait(?Send)]
impl VideoSurface for ImageSequenceStream {
    async fn start_playback(&self) -> Result<(), NativeError> {
        if self.stopped.get() {
            return Err(NativeError::new("AbortError", "playback interrupted"));
        }
        self.playing.set(true);
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        if self.playing.get() && self.current().is_some() {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        }
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        self.current().map(RgbaImage::dimensions)
    }

    fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()> {
        let frame = self
            .current()
            .ok_or_else(|| ScannerError::Sampling("no frame".to_string()))?;

        let (width, height) = (surface.width(), surface.height());
        let result = if frame.dimensions() == (width, height) {
            surface.load_rgba(frame.as_raw())
        } else {
            let scaled = image::imageops::resize(frame, width, height, FilterType::Triangle);
            surface.load_rgba(scaled.as_raw())
        };
        self.advance();
        result
    }
}
