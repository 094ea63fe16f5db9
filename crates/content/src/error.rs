use wasm_bindgen::{JsCast, JsValue};

use promptdock_protocol::ProtocolError;

/// Errors raised inside the content script
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("DOM operation failed: {0}")]
    Dom(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("missing browser global: {0}")]
    MissingGlobal(&'static str),
    #[error("no editable target found")]
    NoTarget,
}

impl From<JsValue> for ContentError {
    fn from(value: JsValue) -> Self {
        Self::Dom(describe_js(&value))
    }
}

impl From<ContentError> for JsValue {
    fn from(err: ContentError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

/// Best-effort readable form of a thrown JS value
pub fn describe_js(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{value:?}")
}

pub type Result<T> = std::result::Result<T, ContentError>;
