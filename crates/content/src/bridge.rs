//! Frame bridge: answers snapshot requests arriving over `postMessage`
//!
//! The `message` channel is shared with whatever else the page posts, so
//! anything that is not a well-formed bridge request is ignored silently.
//! Nothing is ever thrown back across a frame boundary.

use std::cell::Cell;

use tracing::{debug, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, Window};

use promptdock_protocol::{BridgeEnvelope, EnvelopeKind, Snapshot, BRIDGE_MARKER_KEY};
use serde_json::Value;

use crate::dom;
use crate::error::{describe_js, ContentError, Result};
use crate::snapshot;

/// Window property mirroring the install flag, so a second copy of this
/// module injected into the same frame sees the first install.
const INSTALL_FLAG_KEY: &str = "__promptdockBridgeInstalled";

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Per-frame install guard. Set once, never cleared for the life of the page.
pub struct InstallFlag;

impl InstallFlag {
    pub fn is_set(window: &Window) -> bool {
        INSTALLED.with(Cell::get)
            || js_sys::Reflect::get(window, &INSTALL_FLAG_KEY.into())
                .map(|v| v.is_truthy())
                .unwrap_or(false)
    }

    fn set(window: &Window) {
        INSTALLED.with(|flag| flag.set(true));
        if let Err(err) = js_sys::Reflect::set(window, &INSTALL_FLAG_KEY.into(), &JsValue::TRUE) {
            debug!(err = %describe_js(&err), "install flag not mirrored on window");
        }
    }
}

/// Install the bridge in the current frame.
///
/// Returns `Ok(false)` when the bridge was already installed.
pub fn install() -> Result<bool> {
    let window = dom::window()?;
    if InstallFlag::is_set(&window) {
        debug!("frame bridge already installed");
        return Ok(false);
    }

    let on_message = Closure::wrap(Box::new(handle_message) as Box<dyn FnMut(MessageEvent)>);
    // Capture phase, ahead of page handlers that stop propagation
    window.add_event_listener_with_callback_and_bool(
        "message",
        on_message.as_ref().unchecked_ref(),
        true,
    )?;
    on_message.forget();
    InstallFlag::set(&window);

    announce_ready(&window);
    info!("frame bridge installed");
    Ok(true)
}

/// Deliver `message` to the first candidate that accepts it.
///
/// Failures are swallowed; returns the index of the route that delivered,
/// or `None` when every route refused.
pub fn try_routes<T, E: std::fmt::Debug>(
    candidates: &[T],
    mut deliver: impl FnMut(&T) -> std::result::Result<(), E>,
) -> Option<usize> {
    for (idx, target) in candidates.iter().enumerate() {
        match deliver(target) {
            Ok(()) => return Some(idx),
            Err(err) => debug!(route = idx, ?err, "bridge route refused message"),
        }
    }
    None
}

fn parent_window(window: &Window) -> Option<Window> {
    let parent = window.parent().ok().flatten()?;
    if js_sys::Object::is(parent.as_ref(), window.as_ref()) {
        None
    } else {
        Some(parent)
    }
}

fn announce_ready(window: &Window) {
    let Some(parent) = parent_window(window) else {
        return;
    };
    let url = window.location().href().unwrap_or_default();
    let sent = dom::to_js(&BridgeEnvelope::ready(&url))
        .and_then(|msg| parent.post_message(&msg, "*").map_err(Into::into));
    if let Err(err) = sent {
        debug!(%err, "ready announcement not delivered");
    }
}

/// Read a bridge envelope off event data.
///
/// Marker, type and id are read field by field so that a payload which cannot
/// be serialized still yields an answerable request. Most traffic on the
/// channel is not ours and stops at the marker check.
fn decode_envelope(data: &JsValue) -> Option<BridgeEnvelope> {
    if !data.is_object() {
        return None;
    }
    let field = |key: &str| js_sys::Reflect::get(data, &key.into()).ok();
    if field(BRIDGE_MARKER_KEY)?.as_bool() != Some(true) {
        return None;
    }
    let Some(kind) = field("type")
        .and_then(|tag| tag.as_string())
        .and_then(|tag| EnvelopeKind::from_tag(&tag))
    else {
        debug!("ignoring bridge message with unknown type");
        return None;
    };
    let request_id = field("requestId").and_then(|id| id.as_string());
    let payload = field("payload").and_then(|payload| decode_payload(&payload));
    Some(BridgeEnvelope::new(kind, request_id, payload))
}

/// A payload that is absent or cannot be serialized reads as `None`
fn decode_payload(payload: &JsValue) -> Option<Value> {
    if payload.is_undefined() || payload.is_null() {
        return None;
    }
    let decoded = dom::to_json(payload)
        .and_then(|json| serde_json::from_str(&json).map_err(ContentError::from));
    match decoded {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(%err, "unreadable bridge payload, using defaults");
            None
        }
    }
}

fn handle_message(event: MessageEvent) {
    let Some(envelope) = decode_envelope(&event.data()) else {
        return;
    };
    let Some(request_id) = envelope.answerable_request_id() else {
        return;
    };

    let request = envelope.snapshot_request();
    let snapshot = dom::document()
        .map(|doc| snapshot::collect(&doc, &request))
        .unwrap_or_else(|_| Snapshot::default());
    debug!(
        request_id,
        content_len = snapshot.content.len(),
        html_len = snapshot.html.len(),
        "collected snapshot"
    );

    let reply = match BridgeEnvelope::response(request_id, &snapshot)
        .map_err(Into::into)
        .and_then(|env| dom::to_js(&env))
    {
        Ok(reply) => reply,
        Err(err) => {
            debug!(request_id, %err, "could not encode bridge response");
            return;
        }
    };

    match try_routes(&reply_routes(&event), |target| target.post_message(&reply, "*")) {
        Some(route) => debug!(request_id, route, "bridge response sent"),
        None => debug!(request_id, "bridge response dropped, no reachable sender"),
    }
}

/// Reply targets in preference order: the event's sender, then the parent.
fn reply_routes(event: &MessageEvent) -> Vec<Window> {
    let mut routes = Vec::with_capacity(2);
    if let Some(source) = event.source() {
        // Cross-origin window proxies fail `instanceof Window`; `postMessage`
        // is still callable on them.
        routes.push(source.unchecked_into::<Window>());
    }
    if let Some(parent) = dom::window().ok().as_ref().and_then(parent_window) {
        routes.push(parent);
    }
    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_accepting_route_wins() {
        let mut attempts = Vec::new();
        let delivered = try_routes(&["source", "parent"], |route| {
            attempts.push(*route);
            Ok::<(), ()>(())
        });
        assert_eq!(delivered, Some(0));
        assert_eq!(attempts, vec!["source"]);
    }

    #[test]
    fn test_falls_back_to_next_route() {
        let mut attempts = Vec::new();
        let delivered = try_routes(&["source", "parent"], |route| {
            attempts.push(*route);
            if *route == "source" {
                Err("cross-origin")
            } else {
                Ok(())
            }
        });
        assert_eq!(delivered, Some(1));
        assert_eq!(attempts, vec!["source", "parent"]);
    }

    #[test]
    fn test_all_routes_refuse() {
        let delivered = try_routes(&["source", "parent"], |_| Err::<(), _>("detached"));
        assert_eq!(delivered, None);

        let none: [&str; 0] = [];
        assert_eq!(try_routes(&none, |_| Ok::<(), ()>(())), None);
    }
}
