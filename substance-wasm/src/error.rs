//! Converts [`substance::Error`] into a `JsValue` host error: a
//! `thiserror` message string wrapped as a JS `Error`.

use wasm_bindgen::JsValue;

pub struct JsError(pub substance::Error);

impl From<substance::Error> for JsError {
    fn from(err: substance::Error) -> Self {
        JsError(err)
    }
}

impl From<JsError> for JsValue {
    fn from(err: JsError) -> Self {
        js_sys::Error::new(&err.0.to_string()).into()
    }
}

pub type JsResult<T> = Result<T, JsError>;
