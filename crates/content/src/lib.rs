//! promptdock content script
//!
//! Injected into every frame of a page. Installs the snapshot bridge, the
//! prompt panel controller, local triggers and the host command listener.

pub mod bridge;
pub mod config;
pub mod dom;
pub mod error;
pub mod host;
pub mod inserter;
pub mod locator;
pub mod panel;
pub mod snapshot;
pub mod triggers;

use tracing::{error, info, warn, Level};
use wasm_bindgen::prelude::*;

use promptdock_protocol::SnapshotRequest;

use crate::config::ContentConfig;
use crate::error::ContentError;

#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let config = ContentConfig::from_window();
    init_logging(config.as_ref().map_or(Level::INFO, ContentConfig::max_level));
    let config = config.unwrap_or_else(|err| {
        warn!(%err, "ignoring invalid page config");
        ContentConfig::default()
    });

    start(&config);
    Ok(())
}

fn init_logging(level: Level) {
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
}

/// Bring up every component. A component that fails to start is logged and
/// the rest still start.
fn start(config: &ContentConfig) {
    if let Err(err) = bridge::install() {
        error!(%err, "frame bridge failed to install");
    }
    panel::init(config);
    if let Err(err) = triggers::install(config) {
        error!(%err, "trigger listeners failed to install");
    }
    if let Err(err) = host::listen() {
        error!(%err, "host command listener failed to install");
    }
    info!("content script ready");
}

/// Install the frame bridge; `false` if it was already installed
#[wasm_bindgen(js_name = installBridge)]
pub fn install_bridge() -> Result<bool, JsValue> {
    Ok(bridge::install()?)
}

#[wasm_bindgen(js_name = openPanel)]
pub fn open_panel() -> Result<bool, JsValue> {
    Ok(panel::open_panel()?)
}

#[wasm_bindgen(js_name = closePanel)]
pub fn close_panel() -> bool {
    panel::close_panel()
}

#[wasm_bindgen(js_name = isPanelOpen)]
pub fn is_panel_open() -> bool {
    panel::is_open()
}

/// Insert `text` at the caret of the current editable target.
/// Resolves to `false` when the page has no editable target.
#[wasm_bindgen(js_name = insertText)]
pub fn insert_text(text: &str) -> Result<bool, JsValue> {
    match host::insert_prompt(text) {
        Ok(()) => Ok(true),
        Err(ContentError::NoTarget) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Snapshot this frame directly, without going through `postMessage`
#[wasm_bindgen(js_name = collectSnapshot)]
pub fn collect_snapshot(request: JsValue) -> Result<JsValue, JsValue> {
    let request: SnapshotRequest = if request.is_undefined() || request.is_null() {
        SnapshotRequest::default()
    } else {
        let json = dom::to_json(&request)?;
        serde_json::from_str(&json).map_err(ContentError::from)?
    };
    let doc = dom::document()?;
    Ok(dom::to_js(&snapshot::collect(&doc, &request))?)
}
