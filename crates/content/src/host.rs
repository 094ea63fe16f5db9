//! Commands from the extension host over its runtime messaging channel
//!
//! The channel itself belongs to the browser; this module only registers a
//! listener, decodes commands and reports an outcome when asked to.

use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use promptdock_protocol::{CommandReply, HostCommand};

use crate::dom;
use crate::error::{describe_js, ContentError, Result};
use crate::{inserter, locator, panel};

/// Extension namespaces probed for `runtime.onMessage`, in order
const RUNTIME_NAMESPACES: &[&str] = &["chrome", "browser"];

/// Register the command listener. Returns `Ok(false)` outside an extension
/// context, where no runtime channel exists.
pub fn listen() -> Result<bool> {
    let Some(on_message) = runtime_on_message()? else {
        debug!("no extension runtime, host commands disabled");
        return Ok(false);
    };
    let add_listener = js_sys::Reflect::get(&on_message, &"addListener".into())?
        .dyn_into::<js_sys::Function>()
        .map_err(|_| ContentError::MissingGlobal("runtime.onMessage.addListener"))?;

    let listener = Closure::wrap(Box::new(
        |message: JsValue, _sender: JsValue, send_response: JsValue| -> JsValue {
            let Some(command) = decode_command(&message) else {
                return JsValue::FALSE;
            };
            let reply = dispatch(&command);
            if let Some(respond) = send_response.dyn_ref::<js_sys::Function>() {
                match dom::to_js(&reply) {
                    Ok(value) => {
                        if let Err(err) = respond.call1(&JsValue::NULL, &value) {
                            debug!(err = %describe_js(&err), "sendResponse failed");
                        }
                    }
                    Err(err) => warn!(%err, "could not encode command reply"),
                }
            }
            // Replied synchronously; the channel need not stay open
            JsValue::FALSE
        },
    ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>);

    add_listener.call1(&on_message, listener.as_ref())?;
    listener.forget();
    info!("listening for host commands");
    Ok(true)
}

fn runtime_on_message() -> Result<Option<JsValue>> {
    let global = js_sys::global();
    for namespace in RUNTIME_NAMESPACES {
        let Some(api) = defined(js_sys::Reflect::get(&global, &(*namespace).into())?) else {
            continue;
        };
        let Some(runtime) = defined(js_sys::Reflect::get(&api, &"runtime".into())?) else {
            continue;
        };
        if let Some(on_message) = defined(js_sys::Reflect::get(&runtime, &"onMessage".into())?) {
            return Ok(Some(on_message));
        }
    }
    Ok(None)
}

fn defined(value: JsValue) -> Option<JsValue> {
    (!value.is_undefined() && !value.is_null()).then_some(value)
}

/// Messages that are not host commands are not ours to answer
fn decode_command(message: &JsValue) -> Option<HostCommand> {
    if !message.is_object() {
        return None;
    }
    let json = dom::to_json(message).ok()?;
    HostCommand::decode(&json).ok()
}

/// Run one host command and describe the outcome
pub fn dispatch(command: &HostCommand) -> CommandReply {
    debug!(%command, "host command");
    let outcome = match command {
        HostCommand::OpenPanel => panel::open_panel().map(drop),
        HostCommand::InsertPrompt(text) => insert_prompt(text),
    };
    match outcome {
        Ok(()) => CommandReply::ok(),
        Err(err) => {
            warn!(%command, %err, "host command failed");
            CommandReply::failed(err.to_string())
        }
    }
}

/// Insert `text` into the page's current editable target.
///
/// Leaves the panel as it is; the panel's own inputs are never a target.
pub fn insert_prompt(text: &str) -> Result<()> {
    let doc = dom::document()?;
    let panel_host = panel::host_element();
    let target = locator::locate(&doc, panel_host.as_ref()).ok_or(ContentError::NoTarget)?;
    debug!(kind = ?target.kind(), len = text.len(), "inserting prompt");
    inserter::insert(&target, text)
}
