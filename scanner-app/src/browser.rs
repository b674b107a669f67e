//! Browser implementations of the scanner platform traits.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use scanner_core::{
    CameraStream, CaptureApi, CaptureBackend, CaptureCapabilities, CaptureConstraintCandidate,
    FrameHandle, FrameScheduler, FrameTask, ManualEntryPrompt, MediaTracks, NativeError,
    ReadyState, SampleSurface, ScannerError, ScannerResult, VideoSurface,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, MediaStream,
    MediaStreamConstraints, MediaStreamTrack, MediaStreamTrackState, Window,
};

/// Convert a thrown or rejected JS value into a [`NativeError`].
///
/// Reads `name`/`message` off any error-like object (`DOMException`,
/// `OverconstrainedError`, `TypeError`, ...); plain strings become the message.
pub fn native_error(value: &JsValue) -> NativeError {
    if let Some(message) = value.as_string() {
        return NativeError::new("Error", message);
    }
    let field = |key: &str| {
        Reflect::get(value, &JsValue::from_str(key))
            .ok()
            .and_then(|v| v.as_string())
    };
    NativeError::new(
        field("name").unwrap_or_else(|| "Error".to_string()),
        field("message").unwrap_or_else(|| format!("{value:?}")),
    )
}

fn has_function(target: &JsValue, name: &str) -> bool {
    Reflect::get(target, &JsValue::from_str(name)).is_ok_and(|v| v.is_function())
}

// ============================================================================
// Capture
// ============================================================================

/// Page elements a stream is played into and sampled from.
#[derive(Clone)]
pub struct MediaElements {
    /// Visible video element.
    pub video: HtmlVideoElement,
    /// Hidden sampling canvas.
    pub canvas: HtmlCanvasElement,
    /// 2D context of `canvas`, created with `willReadFrequently`.
    pub ctx: CanvasRenderingContext2d,
}

/// [`CaptureBackend`] over `navigator`.
pub struct BrowserCapture {
    window: Window,
    elements: MediaElements,
}

impl BrowserCapture {
    /// Create a backend bound to the given elements.
    #[must_use]
    pub fn new(window: Window, elements: MediaElements) -> Self {
        Self { window, elements }
    }

    fn request(&self, api: CaptureApi, constraints: &JsValue) -> Result<Promise, NativeError> {
        let navigator = self.window.navigator();

        if api == CaptureApi::Modern {
            let devices = navigator.media_devices().map_err(|e| native_error(&e))?;
            let constraints = constraints.unchecked_ref::<MediaStreamConstraints>();
            return devices
                .get_user_media_with_constraints(constraints)
                .map_err(|e| native_error(&e));
        }

        // Callback-style vintages: wrap success/error callbacks in a promise.
        let method = api.name();
        let target: JsValue = navigator.into();
        let function: Function = Reflect::get(&target, &JsValue::from_str(method))
            .map_err(|e| native_error(&e))?
            .dyn_into()
            .map_err(|_| {
                NativeError::new("NotSupportedError", format!("{method} is not a function"))
            })?;

        Ok(Promise::new(&mut |resolve, reject| {
            if let Err(err) = function.call3(&target, constraints, &resolve, &reject) {
                if let Err(err) = reject.call1(&JsValue::NULL, &err) {
                    tracing::warn!("Failed to reject {method}: {err:?}");
                }
            }
        }))
    }
}

#[async_trait(?Send)]
impl CaptureBackend for BrowserCapture {
    fn capabilities(&self) -> CaptureCapabilities {
        let navigator = self.window.navigator();
        let nav: &JsValue = navigator.as_ref();
        let media_devices = Reflect::get(nav, &JsValue::from_str("mediaDevices"))
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null());
        let location = self.window.location();

        CaptureCapabilities {
            has_media_devices: media_devices.is_some(),
            has_get_user_media: media_devices
                .as_ref()
                .is_some_and(|devices| has_function(devices, "getUserMedia")),
            has_legacy_get_user_media: has_function(nav, "getUserMedia"),
            has_webkit_get_user_media: has_function(nav, "webkitGetUserMedia"),
            has_moz_get_user_media: has_function(nav, "mozGetUserMedia"),
            is_secure_context: self.window.is_secure_context(),
            protocol: location.protocol().unwrap_or_default(),
            hostname: location.hostname().unwrap_or_default(),
            user_agent: navigator.user_agent().unwrap_or_default(),
        }
    }

    async fn open(
        &self,
        api: CaptureApi,
        candidate: &CaptureConstraintCandidate,
    ) -> Result<Box<dyn CameraStream>, NativeError> {
        let constraints = js_sys::JSON::parse(&candidate.to_media_constraints().to_string())
            .map_err(|e| native_error(&e))?;
        let promise = self.request(api, &constraints)?;

        let stream: MediaStream = JsFuture::from(promise)
            .await
            .map_err(|e| native_error(&e))?
            .dyn_into()
            .map_err(|_| NativeError::new("TypeError", "capture did not return a MediaStream"))?;

        Ok(Box::new(BrowserStream {
            stream,
            elements: self.elements.clone(),
        }))
    }
}

/// An open `MediaStream` played into the page's video element.
pub struct BrowserStream {
    stream: MediaStream,
    elements: MediaElements,
}

impl BrowserStream {
    fn tracks(list: &js_sys::Array) -> impl Iterator<Item = MediaStreamTrack> + '_ {
        list.iter().filter_map(|track| track.dyn_into::<MediaStreamTrack>().ok())
    }
}

impl MediaTracks for BrowserStream {
    fn live_video_tracks(&self) -> usize {
        Self::tracks(&self.stream.get_video_tracks())
            .filter(|track| track.ready_state() == MediaStreamTrackState::Live)
            .count()
    }

    fn stop_tracks(&self) {
        for track in Self::tracks(&self.stream.get_tracks()) {
            track.stop();
        }
        let video = &self.elements.video;
        if video.src_object().as_ref() == Some(&self.stream) {
            video.set_src_object(None);
        }
    }
}

#[async_trait(?Send)]
impl VideoSurface for BrowserStream {
    async fn start_playback(&self) -> Result<(), NativeError> {
        let video = &self.elements.video;
        video.set_muted(true);
        if let Err(err) = video.set_attribute("playsinline", "true") {
            tracing::debug!("Could not set playsinline: {err:?}");
        }
        video.set_src_object(Some(&self.stream));

        let promise = video.play().map_err(|e| native_error(&e))?;
        JsFuture::from(promise)
            .await
            .map(|_| ())
            .map_err(|e| native_error(&e))
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_level(self.elements.video.ready_state())
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        let video = &self.elements.video;
        let size = (video.video_width(), video.video_height());
        (size.0 > 0 && size.1 > 0).then_some(size)
    }

    fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()> {
        let MediaElements { video, canvas, ctx } = &self.elements;
        let (width, height) = (surface.width(), surface.height());
        if canvas.width() != width || canvas.height() != height {
            canvas.set_width(width);
            canvas.set_height(height);
        }

        let sampling = |e: JsValue| ScannerError::Sampling(native_error(&e).to_string());
        ctx.draw_image_with_html_video_element_and_dw_and_dh(
            video,
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        )
        .map_err(sampling)?;
        let image = ctx
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(sampling)?;

        surface.load_rgba(&image.data().0)
    }
}

// ============================================================================
// Scheduling and prompt
// ============================================================================

/// [`FrameScheduler`] over `requestAnimationFrame`.
pub struct AnimationFrameScheduler {
    window: Window,
    next: Cell<u64>,
    /// Scheduler handle -> browser request id, for frames not yet run.
    pending: Rc<RefCell<HashMap<u64, i32>>>,
}

impl AnimationFrameScheduler {
    /// Create a scheduler on `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            window,
            next: Cell::new(0),
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&self, task: FrameTask) -> FrameHandle {
        let id = self.next.get();
        self.next.set(id.wrapping_add(1));

        let pending = Rc::clone(&self.pending);
        let callback = Closure::once_into_js(move || {
            pending.borrow_mut().remove(&id);
            task();
        });

        match self.window.request_animation_frame(callback.unchecked_ref()) {
            Ok(request) => {
                self.pending.borrow_mut().insert(id, request);
            }
            Err(err) => tracing::warn!("requestAnimationFrame failed: {err:?}"),
        }
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        let request = self.pending.borrow_mut().remove(&handle.0);
        if let Some(request) = request {
            if let Err(err) = self.window.cancel_animation_frame(request) {
                tracing::warn!("cancelAnimationFrame failed: {err:?}");
            }
        }
    }
}

/// [`ManualEntryPrompt`] over `window.prompt`.
pub struct WindowPrompt {
    window: Window,
}

impl WindowPrompt {
    /// Create a prompt on `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl ManualEntryPrompt for WindowPrompt {
    fn prompt(&self, message: &str) -> Option<String> {
        self.window.prompt_with_message(message).ok().flatten()
    }
}

/// Resolve after `duration` on the browser timer.
pub async fn sleep(window: &Window, duration: Duration) {
    let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let promise = Promise::new(&mut |resolve, _reject| {
        if window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
            .is_err()
        {
            // No timer available: resolve right away.
            if let Err(err) = resolve.call0(&JsValue::NULL) {
                tracing::warn!("Failed to resolve sleep: {err:?}");
            }
        }
    });
    if let Err(err) = JsFuture::from(promise).await {
        tracing::debug!("Sleep interrupted: {err:?}");
    }
}
