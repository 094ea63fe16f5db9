//! Local panel triggers: the `/` key, Escape, and the typed `/p` suffix

use std::cell::Cell;

use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, KeyboardEvent};

use crate::config::ContentConfig;
use crate::dom;
use crate::error::Result;
use crate::locator;
use crate::panel;

thread_local! {
    static COMPOSING: Cell<bool> = const { Cell::new(false) };
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Whether an IME composition session is in progress
pub struct CompositionFlag;

impl CompositionFlag {
    pub fn is_active() -> bool {
        COMPOSING.with(Cell::get)
    }

    fn set(active: bool) {
        COMPOSING.with(|flag| flag.set(active));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    OpenPanel,
    ClosePanel,
    Ignore,
}

/// The parts of a keydown that decide a trigger
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyPress {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub composing: bool,
}

impl KeyPress {
    fn from_event(e: &KeyboardEvent) -> Self {
        Self {
            key: e.key(),
            ctrl: e.ctrl_key(),
            alt: e.alt_key(),
            meta: e.meta_key(),
            composing: e.is_composing() || CompositionFlag::is_active(),
        }
    }

    /// Shift is allowed: layouts that need it for `/` still report key `/`.
    pub fn action(&self, editable_focused: bool) -> KeyAction {
        match self.key.as_str() {
            "Escape" => KeyAction::ClosePanel,
            "/" if editable_focused
                && !self.composing
                && !self.ctrl
                && !self.alt
                && !self.meta =>
            {
                KeyAction::OpenPanel
            }
            _ => KeyAction::Ignore,
        }
    }
}

/// Whether typing moved a field's text into the trigger suffix.
///
/// Fires only on the transition, so text that keeps ending in the suffix
/// does not fire again until it has left and re-entered it.
pub fn suffix_entered(previous: Option<&str>, current: &str, suffix: &str) -> bool {
    !suffix.is_empty()
        && current.ends_with(suffix)
        && !previous.is_some_and(|prev| prev.ends_with(suffix))
}

/// Per-element memory of the last observed text, keyed weakly by element
struct SuffixWatch {
    seen: js_sys::WeakMap,
    suffix: String,
}

impl SuffixWatch {
    fn new(suffix: &str) -> Self {
        Self {
            seen: js_sys::WeakMap::new(),
            suffix: suffix.to_string(),
        }
    }

    fn observe(&self, el: &Element, current: &str) -> bool {
        let key: &js_sys::Object = el.as_ref();
        let previous = self.seen.get(key).as_string();
        self.seen.set(key, &current.into());
        suffix_entered(previous.as_deref(), current, &self.suffix)
    }
}

/// Register composition, keyboard and input listeners on the document.
///
/// Returns `Ok(false)` when they are already registered.
pub fn install(config: &ContentConfig) -> Result<bool> {
    if INSTALLED.with(Cell::get) {
        return Ok(false);
    }
    let doc = dom::document()?;

    for (name, active) in [("compositionstart", true), ("compositionend", false)] {
        let cb = Closure::wrap(Box::new(move |_: Event| CompositionFlag::set(active)) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback_and_bool(name, cb.as_ref().unchecked_ref(), true)?;
        cb.forget();
    }

    let keyboard_trigger = config.keyboard_trigger;
    let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
        let press = KeyPress::from_event(&e);
        let editable_focused = keyboard_trigger && editable_is_focused();
        match press.action(editable_focused) {
            KeyAction::OpenPanel => {
                if let Err(err) = panel::open_panel() {
                    warn!(%err, "panel failed to open from keyboard");
                }
            }
            KeyAction::ClosePanel => {
                panel::close_panel();
            }
            KeyAction::Ignore => {}
        }
    }) as Box<dyn FnMut(_)>);
    doc.add_event_listener_with_callback_and_bool("keydown", keydown.as_ref().unchecked_ref(), true)?;
    keydown.forget();

    if config.slash_trigger {
        let watch = SuffixWatch::new(&config.trigger_suffix);
        let oninput = Closure::wrap(Box::new(move |e: Event| {
            let Some(el) = event_origin(&e) else {
                return;
            };
            let Some(target) = locator::classify(&el) else {
                return;
            };
            if watch.observe(&el, target.current_text().trim_end()) {
                debug!("trigger suffix typed");
                if let Err(err) = panel::open_panel() {
                    warn!(%err, "panel failed to open from typed trigger");
                }
            }
        }) as Box<dyn FnMut(_)>);
        doc.add_event_listener_with_callback_and_bool("input", oninput.as_ref().unchecked_ref(), true)?;
        oninput.forget();
    }

    INSTALLED.with(|flag| flag.set(true));
    debug!(
        keyboard = config.keyboard_trigger,
        suffix = config.slash_trigger,
        "panel triggers installed"
    );
    Ok(true)
}

fn editable_is_focused() -> bool {
    let Ok(doc) = dom::document() else {
        return false;
    };
    let host = panel::host_element();
    dom::deep_active_element(&doc, host.as_ref())
        .and_then(|el| locator::classify(&el))
        .is_some()
}

/// The innermost element an event came from, seen through open shadow roots
fn event_origin(e: &Event) -> Option<Element> {
    e.composed_path()
        .get(0)
        .dyn_into::<Element>()
        .ok()
        .or_else(|| e.target().and_then(|t| t.dyn_into::<Element>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(key: &str) -> KeyPress {
        KeyPress {
            key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_slash_opens_only_in_editable() {
        assert_eq!(press("/").action(true), KeyAction::OpenPanel);
        assert_eq!(press("/").action(false), KeyAction::Ignore);
    }

    #[test]
    fn test_modified_slash_ignored() {
        let ctrl = KeyPress { ctrl: true, ..press("/") };
        let meta = KeyPress { meta: true, ..press("/") };
        let alt = KeyPress { alt: true, ..press("/") };
        for p in [ctrl, meta, alt] {
            assert_eq!(p.action(true), KeyAction::Ignore);
        }
    }

    #[test]
    fn test_slash_ignored_while_composing() {
        let p = KeyPress { composing: true, ..press("/") };
        assert_eq!(p.action(true), KeyAction::Ignore);
    }

    #[test]
    fn test_escape_closes_anywhere() {
        assert_eq!(press("Escape").action(false), KeyAction::ClosePanel);
        assert_eq!(press("a").action(true), KeyAction::Ignore);
    }

    #[test]
    fn test_suffix_fires_once_on_entry() {
        assert!(suffix_entered(Some("hi"), "hi/p", "/p"));
        assert!(!suffix_entered(Some("hi/p"), "hi/p", "/p"));
        assert!(!suffix_entered(Some("hi/p"), "hi/px", "/p"));
        assert!(!suffix_entered(Some("hi/px"), "hi/pxy", "/p"));
    }

    #[test]
    fn test_suffix_refires_after_leaving() {
        assert!(!suffix_entered(Some("hi/p"), "hi/", "/p"));
        assert!(suffix_entered(Some("hi/"), "hi/p", "/p"));
    }

    #[test]
    fn test_suffix_first_observation() {
        assert!(suffix_entered(None, "/p", "/p"));
        assert!(!suffix_entered(None, "hello", "/p"));
        assert!(!suffix_entered(None, "anything", ""));
    }
}
