//! Fake platform for lifecycle integration tests.
//!
//! Every collaborator records what it was asked to do so tests can assert on
//! camera use (opens, stops), scheduled frames and callbacks.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use scanner_core::{
    CameraStream, CaptureApi, CaptureBackend, CaptureCapabilities, CaptureConstraintCandidate,
    FrameHandle, FrameScheduler, FrameTask, ManualEntryPrompt, MediaTracks, NativeError,
    QrDecoder, ReadyState, SampleSurface, ScanCallbacks, ScanController, ScanPlatform,
    ScanState, ScannerConfig, ScannerResult, VideoSurface,
};

pub const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

pub const IPHONE_UA: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1";

/// Capabilities of a current browser on a secure origin.
pub fn modern_caps(user_agent: &str) -> CaptureCapabilities {
    CaptureCapabilities {
        has_media_devices: true,
        has_get_user_media: true,
        is_secure_context: true,
        protocol: "https:".to_string(),
        hostname: "maintenance.example.com".to_string(),
        user_agent: user_agent.to_string(),
        ..CaptureCapabilities::default()
    }
}

pub fn native(name: &str, message: &str) -> NativeError {
    NativeError::new(name, message)
}

// ============================================================================
// Camera
// ============================================================================

/// Track state of one opened stream.
#[derive(Debug, Default)]
pub struct StreamProbe {
    pub stop_calls: Cell<u32>,
}

impl StreamProbe {
    pub fn is_stopped(&self) -> bool {
        self.stop_calls.get() > 0
    }
}

pub struct FakeStream {
    probe: Rc<StreamProbe>,
    playback: Option<NativeError>,
    ready: Rc<Cell<ReadyState>>,
}

impl MediaTracks for FakeStream {
    fn live_video_tracks(&self) -> usize {
        usize::from(!self.probe.is_stopped())
    }

    fn stop_tracks(&self) {
        self.probe.stop_calls.set(self.probe.stop_calls.get() + 1);
    }
}

#[async_trait(?Send)]
impl VideoSurface for FakeStream {
    async fn start_playback(&self) -> Result<(), NativeError> {
        match &self.playback {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.ready.get()
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        Some((32, 24))
    }

    fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()> {
        let blank = vec![255u8; surface.pixels().len()];
        surface.load_rgba(&blank)
    }
}

/// Outcome of one `open` call.
pub enum Step {
    /// Resolve immediately with a live stream.
    Open,
    /// Resolve immediately with an error.
    Fail(NativeError),
    /// Resolve when the test sends on the paired channel.
    Pending(oneshot::Receiver<Result<(), NativeError>>),
}

pub struct FakeBackend {
    caps: CaptureCapabilities,
    script: RefCell<VecDeque<Step>>,
    pub attempts: RefCell<Vec<(CaptureApi, CaptureConstraintCandidate)>>,
    pub streams: RefCell<Vec<Rc<StreamProbe>>>,
    pub playback_error: RefCell<Option<NativeError>>,
    pub ready: Rc<Cell<ReadyState>>,
}

impl FakeBackend {
    pub fn new(caps: CaptureCapabilities) -> Rc<Self> {
        Rc::new(Self {
            caps,
            script: RefCell::new(VecDeque::new()),
            attempts: RefCell::new(Vec::new()),
            streams: RefCell::new(Vec::new()),
            playback_error: RefCell::new(None),
            ready: Rc::new(Cell::new(ReadyState::HaveEnoughData)),
        })
    }

    pub fn push(&self, step: Step) {
        self.script.borrow_mut().push_back(step);
    }

    /// Queue a pending step and return its resolver.
    pub fn push_pending(&self) -> oneshot::Sender<Result<(), NativeError>> {
        let (tx, rx) = oneshot::channel();
        self.push(Step::Pending(rx));
        tx
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.borrow().len()
    }

    pub fn open_streams(&self) -> usize {
        self.streams
            .borrow()
            .iter()
            .filter(|probe| !probe.is_stopped())
            .count()
    }

    /// True when no stream was ever stopped more than once.
    pub fn no_double_stops(&self) -> bool {
        self.streams
            .borrow()
            .iter()
            .all(|probe| probe.stop_calls.get() <= 1)
    }

    fn new_stream(&self) -> Box<dyn CameraStream> {
        let probe = Rc::new(StreamProbe::default());
        self.streams.borrow_mut().push(Rc::clone(&probe));
        Box::new(FakeStream {
            probe,
            playback: self.playback_error.borrow().clone(),
            ready: Rc::clone(&self.ready),
        })
    }
}

#[async_trait(?Send)]
impl CaptureBackend for FakeBackend {
    fn capabilities(&self) -> CaptureCapabilities {
        self.caps.clone()
    }

    async fn open(
        &self,
        api: CaptureApi,
        candidate: &CaptureConstraintCandidate,
    ) -> Result<Box<dyn CameraStream>, NativeError> {
        self.attempts.borrow_mut().push((api, candidate.clone()));
        let step = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Step::Fail(native("NotFoundError", "no more scripted devices")));

        match step {
            Step::Open => Ok(self.new_stream()),
            Step::Fail(err) => Err(err),
            Step::Pending(rx) => match rx.await {
                Ok(Ok(())) => Ok(self.new_stream()),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(native("AbortError", "resolver dropped")),
            },
        }
    }
}

// ============================================================================
// Scheduling, decoding, prompt
// ============================================================================

/// Frame queue advanced by hand.
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<(FrameHandle, FrameTask)>>,
    next: Cell<u64>,
    pub requested: Cell<u32>,
    pub cancelled: Cell<u32>,
}

impl ManualScheduler {
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the oldest queued frame. Returns `false` when the queue is empty.
    pub fn run_next(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some((_, task)) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run up to `limit` frames.
    pub fn run_frames(&self, limit: usize) -> usize {
        (0..limit).take_while(|_| self.run_next()).count()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, task: FrameTask) -> FrameHandle {
        let handle = FrameHandle(self.next.get());
        self.next.set(self.next.get() + 1);
        self.requested.set(self.requested.get() + 1);
        self.queue.borrow_mut().push_back((handle, task));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let mut queue = self.queue.borrow_mut();
        let before = queue.len();
        queue.retain(|(queued, _)| *queued != handle);
        if queue.len() < before {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}

/// Returns scripted results frame by frame, then nothing.
#[derive(Clone, Default)]
pub struct ScriptedDecoder {
    results: Rc<RefCell<VecDeque<Option<String>>>>,
    pub calls: Rc<Cell<u32>>,
}

impl ScriptedDecoder {
    /// Decode `payload` after `misses` empty frames.
    pub fn after(&self, misses: usize, payload: &str) {
        let mut results = self.results.borrow_mut();
        results.extend(std::iter::repeat(None).take(misses));
        results.push_back(Some(payload.to_string()));
    }
}

impl QrDecoder for ScriptedDecoder {
    fn decode(&self, _rgba: &[u8], _width: u32, _height: u32) -> Option<String> {
        self.calls.set(self.calls.get() + 1);
        self.results.borrow_mut().pop_front().flatten()
    }
}

#[derive(Default)]
pub struct FakePrompt {
    pub answer: RefCell<Option<String>>,
    pub shown: RefCell<Vec<String>>,
}

impl ManualEntryPrompt for FakePrompt {
    fn prompt(&self, message: &str) -> Option<String> {
        self.shown.borrow_mut().push(message.to_string());
        self.answer.borrow().clone()
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Everything the host observed.
#[derive(Default)]
pub struct Events {
    pub successes: RefCell<Vec<String>>,
    pub errors: RefCell<Vec<String>>,
    pub closes: Cell<u32>,
    pub states: RefCell<Vec<String>>,
}

pub struct Harness {
    pub controller: ScanController,
    pub backend: Rc<FakeBackend>,
    pub scheduler: Rc<ManualScheduler>,
    pub decoder: ScriptedDecoder,
    pub prompt: Rc<FakePrompt>,
    pub events: Rc<Events>,
}

impl Harness {
    pub fn new(caps: CaptureCapabilities) -> Self {
        let backend = FakeBackend::new(caps);
        let scheduler = Rc::new(ManualScheduler::default());
        let decoder = ScriptedDecoder::default();
        let prompt = Rc::new(FakePrompt::default());
        let events = Rc::new(Events::default());

        let platform = ScanPlatform::new(
            Rc::clone(&backend) as Rc<dyn CaptureBackend>,
            Rc::clone(&scheduler) as Rc<dyn FrameScheduler>,
            Rc::clone(&prompt) as Rc<dyn ManualEntryPrompt>,
        )
        .with_decoder(Box::new(decoder.clone()));

        let (on_success, on_error, on_close, on_state) = (
            Rc::clone(&events),
            Rc::clone(&events),
            Rc::clone(&events),
            Rc::clone(&events),
        );
        let callbacks = ScanCallbacks::new(
            move |payload| on_success.successes.borrow_mut().push(payload.to_string()),
            move |message| on_error.errors.borrow_mut().push(message.to_string()),
        )
        .with_on_close(move || on_close.closes.set(on_close.closes.get() + 1))
        .with_on_state_change(move |state: &ScanState| {
            on_state.states.borrow_mut().push(state.name().to_string());
        });

        let controller = ScanController::new(platform, ScannerConfig::default(), callbacks);

        Self {
            controller,
            backend,
            scheduler,
            decoder,
            prompt,
            events,
        }
    }

    pub fn desktop() -> Self {
        Self::new(modern_caps(DESKTOP_UA))
    }

    pub fn states(&self) -> Vec<String> {
        self.events.states.borrow().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events.successes.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events.errors.borrow().clone()
    }
}
