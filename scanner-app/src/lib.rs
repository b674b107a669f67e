//! # QR Scanner WASM Application
//!
//! Browser bindings for the QR scan pipeline: camera acquisition through
//! whichever `getUserMedia` vintage the browser offers, a
//! `requestAnimationFrame` decode loop, and a `window.prompt` manual fallback.
//!
//! ## Usage
//!
//! Build for WASM:
//! ```bash
//! wasm-pack build --target web scanner-app
//! ```
//!
//! Then import in JavaScript:
//! ```javascript
//! import init, { QrScanner } from './pkg/scanner_app.js';
//!
//! await init();
//! const scanner = new QrScanner(
//!     'scanner-video',
//!     'scanner-canvas',
//!     (code) => openMachine(code),
//!     (message) => showError(message),
//!     () => hideScanner(),
//! );
//! await scanner.mount();
//! // ...
//! scanner.free(); // releases the camera
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod error;

use std::rc::Rc;

use js_sys::{Function, Object, Promise, Reflect};
use scanner_core::{
    CaptureBackend, FrameScheduler, ManualEntryPrompt, ScanCallbacks, ScanController,
    ScanPlatform, ScanState, ScannerConfig,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, Window};

use crate::browser::{AnimationFrameScheduler, BrowserCapture, MediaElements, WindowPrompt};
pub use crate::error::AppError;

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init_wasm() {
    console_error_panic_hook::set_once();
    tracing::info!("QR scanner WASM initialized (core {})", scanner_core::VERSION);
}

fn call_js(callback: &Function, arg: &JsValue, name: &str) {
    if let Err(err) = callback.call1(&JsValue::NULL, arg) {
        tracing::error!("{name} callback threw: {err:?}");
    }
}

fn media_elements(
    window: &Window,
    video_id: &str,
    canvas_id: &str,
) -> Result<MediaElements, AppError> {
    let document = window.document().ok_or(AppError::NoDocument)?;

    let video = document
        .get_element_by_id(video_id)
        .ok_or_else(|| AppError::ElementNotFound(video_id.to_string()))?
        .dyn_into::<HtmlVideoElement>()
        .map_err(|_| AppError::WrongElement {
            id: video_id.to_string(),
            expected: "video",
        })?;

    let canvas = document
        .get_element_by_id(canvas_id)
        .ok_or_else(|| AppError::ElementNotFound(canvas_id.to_string()))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| AppError::WrongElement {
            id: canvas_id.to_string(),
            expected: "canvas",
        })?;

    // Frames are read back every tick.
    let options = Object::new();
    Reflect::set(&options, &JsValue::from_str("willReadFrequently"), &JsValue::TRUE)
        .map_err(|_| AppError::NoContext)?;
    let ctx = canvas
        .get_context_with_context_options("2d", &options)
        .map_err(|_| AppError::NoContext)?
        .ok_or(AppError::NoContext)?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| AppError::NoContext)?;

    Ok(MediaElements { video, canvas, ctx })
}

/// A QR scanner bound to a video element and a hidden sampling canvas.
///
/// Freeing the object (or letting it be garbage collected) unmounts the
/// scanner and releases the camera.
#[wasm_bindgen]
pub struct QrScanner {
    controller: ScanController,
    capture: Rc<BrowserCapture>,
    window: Window,
}

#[wasm_bindgen]
impl QrScanner {
    /// Create a scanner.
    ///
    /// `config_json` takes `ScannerConfig` fields in camelCase; missing keys
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is missing or of the wrong type, the 2D
    /// context cannot be created, or the config is invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(
        video_id: &str,
        canvas_id: &str,
        on_scan_success: Function,
        on_error: Function,
        on_close: Option<Function>,
        config_json: Option<String>,
    ) -> Result<QrScanner, JsValue> {
        let window = web_sys::window().ok_or(AppError::NoWindow)?;
        let config = match config_json {
            Some(json) => ScannerConfig::from_json(&json).map_err(AppError::from)?,
            None => ScannerConfig::default(),
        };
        let elements = media_elements(&window, video_id, canvas_id)?;

        let capture = Rc::new(BrowserCapture::new(window.clone(), elements));
        let platform = ScanPlatform::new(
            Rc::clone(&capture) as Rc<dyn CaptureBackend>,
            Rc::new(AnimationFrameScheduler::new(window.clone())) as Rc<dyn FrameScheduler>,
            Rc::new(WindowPrompt::new(window.clone())) as Rc<dyn ManualEntryPrompt>,
        );

        let mut callbacks = ScanCallbacks::new(
            move |payload| {
                call_js(&on_scan_success, &JsValue::from_str(payload), "onScanSuccess");
            },
            move |message| call_js(&on_error, &JsValue::from_str(message), "onError"),
        );
        if let Some(on_close) = on_close {
            callbacks = callbacks
                .with_on_close(move || call_js(&on_close, &JsValue::UNDEFINED, "onClose"));
        }

        Ok(Self {
            controller: ScanController::new(platform, config, callbacks),
            capture,
            window,
        })
    }

    /// Mount and start the camera. Resolves once scanning has started or a
    /// failure was reported through `onError`.
    pub fn mount(&self) -> Promise {
        let controller = self.controller.clone();
        future_to_promise(async move {
            controller.mount().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Dismiss the scanner: release the camera and call `onClose`.
    pub fn close(&self) {
        self.controller.close();
    }

    /// Release the camera without invoking any callback.
    pub fn unmount(&self) {
        self.controller.unmount();
    }

    /// Retry from a failure state after the configured delay.
    pub fn retry(&self) -> Promise {
        let controller = self.controller.clone();
        let window = self.window.clone();
        future_to_promise(async move {
            if controller.state().is_failure() {
                browser::sleep(&window, controller.config().retry_delay()).await;
                controller.retry().await;
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Re-request camera permission from a failure state, then restart.
    #[wasm_bindgen(js_name = requestPermission)]
    pub fn request_permission(&self) -> Promise {
        let controller = self.controller.clone();
        future_to_promise(async move {
            controller.request_permission().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Prompt for a code and deliver it through `onScanSuccess`.
    #[wasm_bindgen(js_name = enterManually)]
    pub fn enter_manually(&self) -> bool {
        self.controller.enter_manually()
    }

    /// Current state name, e.g. `scanning` or `permission_denied`.
    #[must_use]
    pub fn state(&self) -> String {
        self.controller.state().name().to_string()
    }

    /// Status line for the current state.
    #[wasm_bindgen(js_name = statusText)]
    #[must_use]
    pub fn status_text(&self) -> String {
        self.controller.status_text()
    }

    /// Message of the current failure, if any.
    #[wasm_bindgen(js_name = errorMessage)]
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.controller.error_message()
    }

    /// Whether the UI should offer manual entry prominently.
    #[wasm_bindgen(js_name = manualEntrySuggested)]
    #[must_use]
    pub fn manual_entry_suggested(&self) -> bool {
        self.controller.manual_entry_suggested()
    }

    /// Number of frames sampled so far.
    #[wasm_bindgen(js_name = framesSampled)]
    #[must_use]
    pub fn frames_sampled(&self) -> u64 {
        self.controller.frames_sampled()
    }

    /// Capture capability flags of this browser as JSON.
    #[must_use]
    pub fn diagnostics(&self) -> String {
        self.capture.capabilities().diagnostics_json()
    }

    /// Scanner snapshot as JSON: state, status, error, manual entry hint.
    #[wasm_bindgen(js_name = snapshotJson)]
    #[must_use]
    pub fn snapshot_json(&self) -> String {
        let state = self.controller.state();
        let payload = match &state {
            ScanState::Success(payload) => Some(payload.clone()),
            _ => None,
        };
        serde_json::json!({
            "state": state.name(),
            "status": state.status_text(),
            "error": self.controller.error_message(),
            "manualEntrySuggested": self.controller.manual_entry_suggested(),
            "payload": payload,
        })
        .to_string()
    }
}

impl Drop for QrScanner {
    fn drop(&mut self) {
        self.controller.unmount();
    }
}
