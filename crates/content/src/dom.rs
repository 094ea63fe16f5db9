use serde::Serialize;
use wasm_bindgen::JsValue;
use web_sys::{Document, Element, Event, EventInit, Window};

use crate::error::{ContentError, Result};

/// Get window helper
pub fn window() -> Result<Window> {
    web_sys::window().ok_or(ContentError::MissingGlobal("window"))
}

/// Get document helper
pub fn document() -> Result<Document> {
    window()?.document().ok_or(ContentError::MissingGlobal("document"))
}

/// Attached to the document and laid out
pub fn is_rendered(el: &Element) -> bool {
    el.is_connected() && el.get_client_rects().length() > 0
}

/// The focused element, following focus into open shadow roots.
///
/// Returns `None` when focus sits on `stop_at` (the panel host), so the
/// panel's own inputs are never treated as page inputs.
pub fn deep_active_element(doc: &Document, stop_at: Option<&Element>) -> Option<Element> {
    let mut active = doc.active_element()?;
    loop {
        if stop_at.is_some_and(|host| host.is_same_node(Some(active.as_ref()))) {
            return None;
        }
        match active.shadow_root().and_then(|root| root.active_element()) {
            Some(inner) => active = inner,
            None => return Some(active),
        }
    }
}

/// Dispatch a plain bubbling `input` event
pub fn dispatch_input(target: &Element) -> Result<()> {
    let init = EventInit::new();
    init.set_bubbles(true);
    let event = Event::new_with_event_init_dict("input", &init)?;
    target.dispatch_event(&event)?;
    Ok(())
}

/// `JSON.stringify` a JS value
pub fn to_json(value: &JsValue) -> Result<String> {
    let json: JsValue = js_sys::JSON::stringify(value)?.into();
    json.as_string()
        .ok_or_else(|| ContentError::Dom("value is not JSON-serializable".into()))
}

/// Serialize a Rust value into a plain JS object
pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue> {
    let json = serde_json::to_string(value)?;
    Ok(js_sys::JSON::parse(&json)?)
}
