//! Platform seams.
//!
//! The pipeline never touches a browser or OS API directly. Hosts implement
//! these traits: the WASM app against `navigator`/`requestAnimationFrame`,
//! the CLI against image files and a tokio timer, tests against fakes.
//!
//! Everything here is single-threaded; futures are `?Send`.

use std::rc::Rc;

use async_trait::async_trait;

use crate::capability::{CaptureApi, CaptureCapabilities};
use crate::constraints::CaptureConstraintCandidate;
use crate::decode::{QrDecoder, RqrrDecoder, SampleSurface};
use crate::error::{NativeError, ScannerResult};

/// Media readiness levels, as reported by an HTML media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// No information about the media.
    HaveNothing,
    /// Dimensions known, no frame data.
    HaveMetadata,
    /// Data for the current position only.
    HaveCurrentData,
    /// Current and at least one following frame.
    HaveFutureData,
    /// Enough data to play through.
    HaveEnoughData,
}

impl ReadyState {
    /// Map a numeric `readyState` (0-4). Out-of-range values saturate.
    #[must_use]
    pub const fn from_level(level: u16) -> Self {
        match level {
            0 => Self::HaveNothing,
            1 => Self::HaveMetadata,
            2 => Self::HaveCurrentData,
            3 => Self::HaveFutureData,
            _ => Self::HaveEnoughData,
        }
    }
}

/// Track-level control of an open stream.
pub trait MediaTracks {
    /// Number of video tracks that are still live.
    fn live_video_tracks(&self) -> usize;

    /// Stop every track of the stream. Called at most once per stream by
    /// [`crate::CameraSession`].
    fn stop_tracks(&self);
}

/// The video surface a stream is rendered into.
#[async_trait(?Send)]
pub trait VideoSurface {
    /// Attach the stream and begin playback.
    ///
    /// # Errors
    ///
    /// Returns the platform error if playback cannot start. An `AbortError`
    /// means playback was interrupted, typically by teardown.
    async fn start_playback(&self) -> Result<(), NativeError>;

    /// Current readiness level.
    fn ready_state(&self) -> ReadyState;

    /// Native pixel dimensions of the video, once known.
    fn video_size(&self) -> Option<(u32, u32)>;

    /// Copy the current frame into `surface`, scaled to the surface size.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be read.
    fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()>;
}

/// An open camera stream together with the surface it plays into.
pub trait CameraStream: MediaTracks + VideoSurface {}

impl<T: MediaTracks + VideoSurface> CameraStream for T {}

/// Camera acquisition entry points of the host.
#[async_trait(?Send)]
pub trait CaptureBackend {
    /// Probe which capture APIs exist, plus context signals.
    fn capabilities(&self) -> CaptureCapabilities;

    /// Ask `api` for a stream matching `candidate`.
    ///
    /// This is the only suspension point of negotiation.
    ///
    /// # Errors
    ///
    /// Returns the platform error unchanged; classification happens in the
    /// negotiator.
    async fn open(
        &self,
        api: CaptureApi,
        candidate: &CaptureConstraintCandidate,
    ) -> Result<Box<dyn CameraStream>, NativeError>;
}

/// Handle to a scheduled frame continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// A continuation run on the next display refresh.
pub type FrameTask = Box<dyn FnOnce()>;

/// Per-frame scheduling primitive (`requestAnimationFrame` in browsers).
pub trait FrameScheduler {
    /// Queue `task` for the next frame.
    fn request_frame(&self, task: FrameTask) -> FrameHandle;

    /// Cancel a queued task. Unknown or already-run handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Synchronous text prompt used for manual code entry.
pub trait ManualEntryPrompt {
    /// Show `message`; `None` when the user cancels.
    fn prompt(&self, message: &str) -> Option<String>;
}

/// Bundle of host collaborators handed to the controller.
pub struct ScanPlatform {
    /// Camera acquisition.
    pub capture: Rc<dyn CaptureBackend>,
    /// Frame scheduling.
    pub scheduler: Rc<dyn FrameScheduler>,
    /// Manual entry prompt.
    pub prompt: Rc<dyn ManualEntryPrompt>,
    /// QR decoder; defaults to [`RqrrDecoder`].
    pub decoder: Box<dyn QrDecoder>,
}

impl ScanPlatform {
    /// Bundle collaborators with the default decoder.
    #[must_use]
    pub fn new(
        capture: Rc<dyn CaptureBackend>,
        scheduler: Rc<dyn FrameScheduler>,
        prompt: Rc<dyn ManualEntryPrompt>,
    ) -> Self {
        Self {
            capture,
            scheduler,
            prompt,
            decoder: Box::new(RqrrDecoder),
        }
    }

    /// Replace the decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Box<dyn QrDecoder>) -> Self {
        self.decoder = decoder;
        self
    }
}
