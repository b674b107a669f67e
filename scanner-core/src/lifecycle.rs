//! Scan lifecycle controller.
//!
//! Owns the single [`CameraSession`] of a scanner instance and drives the
//! state machine:
//!
//! ```text
//! Uninitialized --mount--> Initializing --ok--> Scanning --decode--> Success
//!                               |                   |
//!                               +--failure--> {PermissionDenied | DeviceUnavailable
//!                                              | ApiUnsupported | TransientError}
//! failure --retry--> Initializing        failure --manual entry--> Success
//! any --close/unmount--> Uninitialized
//! ```
//!
//! Every asynchronous continuation captures the generation it was started
//! under and re-checks it before touching state. `close`, `unmount` and each
//! new attempt bump the generation, so late results are discarded and any
//! stream they carry is released.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::ScannerConfig;
use crate::decode::{FrameDecodeLoop, FrameOutcome};
use crate::failure::ScanFailure;
use crate::negotiator::Negotiator;
use crate::platform::{FrameHandle, FrameScheduler, ManualEntryPrompt, ScanPlatform};
use crate::session::CameraSession;
use crate::state::{DecodedPayload, ScanState};

type TextCallback = Box<dyn Fn(&str)>;

/// Observer callbacks supplied by the host.
///
/// Callbacks are never invoked while the controller is borrowed, so they may
/// call back into the controller (e.g. unmount from `on_scan_success`).
pub struct ScanCallbacks {
    on_scan_success: TextCallback,
    on_error: TextCallback,
    on_close: Option<Box<dyn Fn()>>,
    on_state_change: Option<Box<dyn Fn(&ScanState)>>,
}

impl ScanCallbacks {
    /// Create callbacks with the two required handlers.
    #[must_use]
    pub fn new(
        on_scan_success: impl Fn(&str) + 'static,
        on_error: impl Fn(&str) + 'static,
    ) -> Self {
        Self {
            on_scan_success: Box::new(on_scan_success),
            on_error: Box::new(on_error),
            on_close: None,
            on_state_change: None,
        }
    }

    /// Called when the user dismisses the scanner without a result.
    #[must_use]
    pub fn with_on_close(mut self, on_close: impl Fn() + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }

    /// Called after every state transition except those caused by unmount.
    #[must_use]
    pub fn with_on_state_change(
        mut self,
        on_state_change: impl Fn(&ScanState) + 'static,
    ) -> Self {
        self.on_state_change = Some(Box::new(on_state_change));
        self
    }
}

impl fmt::Debug for ScanCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCallbacks")
            .field("on_close", &self.on_close.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish_non_exhaustive()
    }
}

/// Immutable collaborators plus the liveness generation.
struct Shared {
    negotiator: Negotiator,
    prompt: Rc<dyn ManualEntryPrompt>,
    callbacks: ScanCallbacks,
    generation: Cell<u64>,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        let next = self.generation.get().wrapping_add(1);
        self.generation.set(next);
        next
    }
}

/// Mutable controller state.
struct Inner {
    state: ScanState,
    mounted: bool,
    session: Option<CameraSession>,
    decode_loop: FrameDecodeLoop,
    pending_frame: Option<FrameHandle>,
    failure: Option<(ScanFailure, String)>,
    /// Sole scheduler handle; release and drop cancel the pending frame through it.
    scheduler: Rc<dyn FrameScheduler>,
}

impl Inner {
    fn cancel_pending_frame(&mut self) {
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    /// Stop the loop and the session together.
    fn release(&mut self) -> bool {
        self.cancel_pending_frame();
        self.session.take().is_some_and(|mut session| session.close())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Drives one scanner instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ScanController {
    inner: Rc<RefCell<Inner>>,
    shared: Rc<Shared>,
}

impl ScanController {
    /// Create an unmounted controller.
    #[must_use]
    pub fn new(platform: ScanPlatform, config: ScannerConfig, callbacks: ScanCallbacks) -> Self {
        let ScanPlatform {
            capture,
            scheduler,
            prompt,
            decoder,
        } = platform;

        let inner = Inner {
            state: ScanState::Uninitialized,
            mounted: false,
            session: None,
            decode_loop: FrameDecodeLoop::new(decoder),
            pending_frame: None,
            failure: None,
            scheduler,
        };
        let shared = Shared {
            negotiator: Negotiator::new(capture, config),
            prompt,
            callbacks,
            generation: Cell::new(0),
        };

        Self {
            inner: Rc::new(RefCell::new(inner)),
            shared: Rc::new(shared),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.inner.borrow().state.clone()
    }

    /// Status line for the current state.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.inner.borrow().state.status_text().to_string()
    }

    /// User-facing message of the current failure, if in a failure state.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.inner
            .borrow()
            .failure
            .as_ref()
            .map(|(_, message)| message.clone())
    }

    /// Whether the current failure suggests typing the code by hand.
    #[must_use]
    pub fn manual_entry_suggested(&self) -> bool {
        self.inner
            .borrow()
            .failure
            .as_ref()
            .is_some_and(|(failure, _)| failure.manual_entry_suggested())
    }

    /// Whether the scanner is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().mounted
    }

    /// Whether a camera session is currently open.
    #[must_use]
    pub fn has_open_session(&self) -> bool {
        self.inner
            .borrow()
            .session
            .as_ref()
            .is_some_and(|session| !session.is_closed())
    }

    /// Whether a decode continuation is queued.
    #[must_use]
    pub fn has_pending_frame(&self) -> bool {
        self.inner.borrow().pending_frame.is_some()
    }

    /// Frames sampled over the controller's lifetime.
    #[must_use]
    pub fn frames_sampled(&self) -> u64 {
        self.inner.borrow().decode_loop.frames_sampled()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScannerConfig {
        self.shared.negotiator.config()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Mount the scanner and start the camera. No-op when already mounted.
    pub async fn mount(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.mounted {
                tracing::debug!("Scanner already mounted");
                return;
            }
            inner.mounted = true;
        }
        tracing::info!("Scanner mounted");
        self.start().await;
    }

    /// Re-run negotiation from a failure state.
    pub async fn retry(&self) {
        if !self.inner.borrow().state.is_failure() {
            tracing::debug!(
                "Retry ignored in state {}",
                self.inner.borrow().state.name()
            );
            return;
        }
        tracing::info!("Retrying camera");
        self.start().await;
    }

    /// Explicitly re-request camera permission from a failure state, then
    /// restart.
    ///
    /// A probe stream is opened and released before the regular start.
    pub async fn request_permission(&self) {
        {
            let inner = self.inner.borrow();
            if !inner.mounted || !inner.state.is_failure() {
                tracing::debug!("Permission request ignored in state {}", inner.state.name());
                return;
            }
        }
        let token = self.begin_attempt();
        tracing::info!("Requesting camera permission");

        let probe = self.shared.negotiator.probe_permission().await;
        if !self.is_current(token) {
            tracing::debug!("Permission probe settled after teardown");
            return;
        }
        match probe {
            Ok(()) => self.attempt(token).await,
            Err(failure) => self.fail(&failure),
        }
    }

    /// Prompt for a code and deliver it as a scan result.
    ///
    /// Accepted from any failure state. Surrounding whitespace is trimmed;
    /// a cancelled or blank entry changes nothing. Returns `true` when a
    /// payload was delivered.
    pub fn enter_manually(&self) -> bool {
        if !self.inner.borrow().state.is_failure() {
            tracing::debug!(
                "Manual entry ignored in state {}",
                self.inner.borrow().state.name()
            );
            return false;
        }

        let message = &self.shared.negotiator.config().manual_entry_prompt;
        let Some(input) = self.shared.prompt.prompt(message) else {
            tracing::debug!("Manual entry cancelled");
            return false;
        };
        let code = input.trim();
        if code.is_empty() {
            return false;
        }
        if !self.inner.borrow().state.is_failure() {
            return false;
        }

        self.succeed(DecodedPayload::manual(code));
        true
    }

    /// User dismissed the scanner: release the camera, return to
    /// `Uninitialized` and notify `on_close` unless a result was delivered.
    pub fn close(&self) {
        let Some(previous) = self.teardown() else {
            return;
        };
        tracing::info!("Scanner closed from {}", previous.name());

        self.notify_state(&ScanState::Uninitialized);
        if !matches!(previous, ScanState::Success(_)) {
            if let Some(on_close) = &self.shared.callbacks.on_close {
                on_close();
            }
        }
    }

    /// Component teardown: release the camera without invoking callbacks.
    pub fn unmount(&self) {
        if let Some(previous) = self.teardown() {
            tracing::info!("Scanner unmounted from {}", previous.name());
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Invalidate in-flight work, release the camera, enter `Initializing`.
    fn begin_attempt(&self) -> u64 {
        let token = self.shared.next_generation();
        {
            let mut inner = self.inner.borrow_mut();
            inner.release();
            inner.failure = None;
        }
        self.transition(ScanState::Initializing);
        token
    }

    async fn start(&self) {
        let token = self.begin_attempt();
        self.attempt(token).await;
    }

    /// Negotiate and start playback under an attempt begun with `token`.
    async fn attempt(&self, token: u64) {
        let acquired = self.shared.negotiator.acquire().await;
        if !self.is_current(token) {
            if let Ok(mut session) = acquired {
                tracing::warn!(
                    "Releasing camera session {} from a stale attempt",
                    session.id()
                );
                session.close();
            }
            return;
        }

        let session = match acquired {
            Ok(session) => session,
            Err(failure) => {
                self.fail(&failure);
                return;
            }
        };

        let stream = session.stream();
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(mut previous) = inner.session.replace(session) {
                previous.close();
            }
        }

        let played = stream.start_playback().await;
        if !self.is_current(token) {
            if let Err(err) = played {
                tracing::debug!("Playback settled after teardown: {err}");
            }
            return;
        }

        match played {
            Ok(()) => {
                self.transition(ScanState::Scanning);
                self.schedule_frame(token);
            }
            Err(err) => {
                tracing::warn!("Video playback failed: {err}");
                let failure = self.shared.negotiator.classify(&err);
                self.fail(&failure);
            }
        }
    }

    fn is_current(&self, token: u64) -> bool {
        self.shared.generation.get() == token && self.inner.borrow().mounted
    }

    fn fail(&self, failure: &ScanFailure) {
        let message = failure.user_message(&self.shared.negotiator.profile());
        tracing::error!("Camera failure ({:?}): {failure}", failure.kind());

        {
            let mut inner = self.inner.borrow_mut();
            inner.release();
            inner.failure = Some((failure.clone(), message.clone()));
        }
        self.transition(ScanState::from_failure(failure, &message));
        (self.shared.callbacks.on_error)(&message);
    }

    fn succeed(&self, payload: DecodedPayload) {
        self.shared.next_generation();
        {
            let mut inner = self.inner.borrow_mut();
            inner.release();
            inner.failure = None;
        }

        let text = payload.text.clone();
        tracing::info!("QR code delivered ({:?})", payload.source);
        self.transition(ScanState::Success(payload));
        (self.shared.callbacks.on_scan_success)(&text);
    }

    /// Returns the previous state if anything was torn down.
    fn teardown(&self) -> Option<ScanState> {
        self.shared.next_generation();
        let mut inner = self.inner.borrow_mut();
        let released = inner.release();
        let was_mounted = std::mem::replace(&mut inner.mounted, false);
        inner.failure = None;
        let previous = std::mem::take(&mut inner.state);

        if was_mounted || released || previous != ScanState::Uninitialized {
            Some(previous)
        } else {
            None
        }
    }

    fn transition(&self, next: ScanState) {
        let previous = {
            let mut inner = self.inner.borrow_mut();
            std::mem::replace(&mut inner.state, next.clone())
        };
        tracing::info!("Scanner state: {} -> {}", previous.name(), next.name());
        self.notify_state(&next);
    }

    fn notify_state(&self, state: &ScanState) {
        if let Some(on_state_change) = &self.shared.callbacks.on_state_change {
            on_state_change(state);
        }
    }

    fn schedule_frame(&self, token: u64) {
        let inner: Weak<RefCell<Inner>> = Rc::downgrade(&self.inner);
        let shared: Weak<Shared> = Rc::downgrade(&self.shared);

        let scheduler = Rc::clone(&self.inner.borrow().scheduler);
        let handle = scheduler.request_frame(Box::new(move || {
            if let (Some(inner), Some(shared)) = (inner.upgrade(), shared.upgrade()) {
                Self { inner, shared }.run_frame(token);
            }
        }));
        self.inner.borrow_mut().pending_frame = Some(handle);
    }

    fn run_frame(&self, token: u64) {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            inner.pending_frame = None;
            if self.shared.generation.get() != token
                || !inner.mounted
                || inner.state != ScanState::Scanning
            {
                return;
            }
            let Some(stream) = inner.session.as_ref().map(CameraSession::stream) else {
                return;
            };
            inner.decode_loop.tick(stream.as_ref())
        };

        match outcome {
            Ok(FrameOutcome::Decoded(text)) => self.succeed(DecodedPayload::camera(text)),
            Ok(FrameOutcome::NotReady | FrameOutcome::NoCode) => self.schedule_frame(token),
            Err(err) => {
                tracing::debug!("Frame sampling failed: {err}");
                self.schedule_frame(token);
            }
        }
    }
}

impl fmt::Debug for ScanController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ScanController")
            .field("state", &inner.state.name())
            .field("mounted", &inner.mounted)
            .field("session", &inner.session)
            .field("generation", &self.shared.generation.get())
            .finish_non_exhaustive()
    }
}
