//! Runtime configuration for the content script
//!
//! Defaults can be overridden by the embedding page or the extension's loader
//! through a plain object at `window.__PROMPTDOCK_CONFIG`.

use serde::Deserialize;
use tracing::Level;

use crate::dom;
use crate::error::Result;

/// Page-global holding config overrides
pub const CONFIG_GLOBAL: &str = "__PROMPTDOCK_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentConfig {
    /// Id given to the panel's host node
    pub host_element_id: String,
    /// Open the panel on an unmodified `/` keystroke
    pub keyboard_trigger: bool,
    /// Watch editable fields for the trigger suffix
    pub slash_trigger: bool,
    pub trigger_suffix: String,
    pub log_level: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            host_element_id: "promptdock-panel-host".to_string(),
            keyboard_trigger: true,
            slash_trigger: true,
            trigger_suffix: "/p".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ContentConfig {
    /// Read overrides from the page global, if present
    pub fn from_window() -> Result<Self> {
        let window = dom::window()?;
        let raw = js_sys::Reflect::get(&window, &CONFIG_GLOBAL.into())?;
        if raw.is_undefined() || raw.is_null() {
            return Ok(Self::default());
        }
        let json = dom::to_json(&raw)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}
