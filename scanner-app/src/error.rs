//! Errors raised while wiring the scanner to the page.

use scanner_core::ScannerError;
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Setup errors surfaced to JavaScript as exceptions.
#[derive(Debug, Error)]
pub enum AppError {
    /// No global `window`.
    #[error("No window object")]
    NoWindow,

    /// No `document` on the window.
    #[error("No document object")]
    NoDocument,

    /// Element id not present in the document.
    #[error("Element '{0}' not found")]
    ElementNotFound(String),

    /// Element exists but has the wrong type.
    #[error("Element '{id}' is not a {expected}")]
    WrongElement {
        /// Element id.
        id: String,
        /// Expected element kind.
        expected: &'static str,
    },

    /// The 2D sampling context could not be created.
    #[error("2D context not available")]
    NoContext,

    /// Configuration JSON rejected.
    #[error("Invalid scanner config: {0}")]
    Config(#[from] ScannerError),
}

impl From<AppError> for JsValue {
    fn from(err: AppError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
