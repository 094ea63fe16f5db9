//! Finds the editable surface a prompt should go into

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement, HtmlTextAreaElement};

use crate::dom;

/// Candidate selectors in priority order: plain fields, explicit rich-text
/// regions, then ARIA textboxes.
pub const CANDIDATE_SELECTORS: &[&str] = &[
    "textarea, input:not([type]), input[type=\"text\"], input[type=\"search\"], \
     input[type=\"url\"], input[type=\"tel\"]",
    "[contenteditable]:not([contenteditable=\"false\"])",
    "[role=\"textbox\"]",
];

/// `<input>` types that share the textarea's value/selection model
const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Plain,
    Rich,
}

/// A value-based text field
#[derive(Debug, Clone)]
pub enum PlainField {
    TextArea(HtmlTextAreaElement),
    Input(HtmlInputElement),
}

impl PlainField {
    pub fn value(&self) -> String {
        match self {
            Self::TextArea(el) => el.value(),
            Self::Input(el) => el.value(),
        }
    }

    pub fn set_value(&self, value: &str) {
        match self {
            Self::TextArea(el) => el.set_value(value),
            Self::Input(el) => el.set_value(value),
        }
    }

    /// Selection start/end in UTF-16 units, when the field reports them
    pub fn selection(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Self::TextArea(el) => (
                el.selection_start().ok().flatten(),
                el.selection_end().ok().flatten(),
            ),
            Self::Input(el) => (
                el.selection_start().ok().flatten(),
                el.selection_end().ok().flatten(),
            ),
        }
    }

    pub fn set_caret(&self, offset: u32) -> Result<(), wasm_bindgen::JsValue> {
        match self {
            Self::TextArea(el) => el.set_selection_range(offset, offset),
            Self::Input(el) => el.set_selection_range(offset, offset),
        }
    }

    pub fn element(&self) -> &HtmlElement {
        match self {
            Self::TextArea(el) => el,
            Self::Input(el) => el,
        }
    }

    fn is_writable(&self) -> bool {
        match self {
            Self::TextArea(el) => !el.disabled() && !el.read_only(),
            Self::Input(el) => !el.disabled() && !el.read_only(),
        }
    }
}

/// The located target, tagged with its editing model
#[derive(Debug, Clone)]
pub enum InputTarget {
    Plain(PlainField),
    Rich(HtmlElement),
}

impl InputTarget {
    pub const fn kind(&self) -> InputKind {
        match self {
            Self::Plain(_) => InputKind::Plain,
            Self::Rich(_) => InputKind::Rich,
        }
    }

    pub fn element(&self) -> &HtmlElement {
        match self {
            Self::Plain(field) => field.element(),
            Self::Rich(el) => el,
        }
    }

    /// Current text as the user sees it
    pub fn current_text(&self) -> String {
        match self {
            Self::Plain(field) => field.value(),
            Self::Rich(el) => el.inner_text(),
        }
    }
}

/// Classify `el` as an editable surface, or `None` if it is not one
pub fn classify(el: &Element) -> Option<InputTarget> {
    if let Some(area) = el.dyn_ref::<HtmlTextAreaElement>() {
        let field = PlainField::TextArea(area.clone());
        return field.is_writable().then_some(InputTarget::Plain(field));
    }
    if let Some(input) = el.dyn_ref::<HtmlInputElement>() {
        let field = PlainField::Input(input.clone());
        let text_like = TEXT_INPUT_TYPES.contains(&input.type_().as_str());
        return (text_like && field.is_writable()).then_some(InputTarget::Plain(field));
    }

    let html = el.dyn_ref::<HtmlElement>()?;
    let editable_attr = el
        .get_attribute("contenteditable")
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"));
    let textbox_role = el.get_attribute("role").as_deref() == Some("textbox");
    (html.is_content_editable() || editable_attr || textbox_role).then(|| InputTarget::Rich(html.clone()))
}

/// Locate the best editable target in `doc`.
///
/// The focused element wins over selector matches. Candidates that are
/// detached, not rendered, or not editable are skipped. `skip` is the
/// panel host, whose internals never count as page input.
pub fn locate(doc: &Document, skip: Option<&Element>) -> Option<InputTarget> {
    let focused = dom::deep_active_element(doc, skip);
    let matched = CANDIDATE_SELECTORS
        .iter()
        .flat_map(|selector| query_all(doc, selector));

    focused
        .into_iter()
        .chain(matched)
        .filter(dom::is_rendered)
        .find_map(|el| classify(&el))
}

fn query_all(doc: &Document, selector: &str) -> Vec<Element> {
    let Ok(list) = doc.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}
