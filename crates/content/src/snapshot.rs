//! Page snapshot collection for bridge requests
//!
//! Picks a content root, strips non-content subtrees from a detached clone
//! and returns budgeted text and markup. The live document is never touched.

use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

use promptdock_protocol::text::{normalize, truncate_utf16};
use promptdock_protocol::{Snapshot, SnapshotRequest, MAX_TITLE_LENGTH};

/// Subtrees removed from the clone before extraction
pub const STRIPPED_SELECTOR: &str = "script, style, noscript, template, iframe, object, embed, \
     video, audio, canvas, svg, button, input, select, textarea";

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

/// Build a snapshot of `doc` for `request`. Never fails: a missing root
/// degrades to the body, a failed clone to empty text.
pub fn collect(doc: &Document, request: &SnapshotRequest) -> Snapshot {
    let (text, markup) = content_root(doc, &request.selectors())
        .and_then(|root| sanitized_clone(&root))
        .map(|clone| (clone.text_content().unwrap_or_default(), clone.inner_html()))
        .unwrap_or_default();

    Snapshot {
        title: page_title(doc),
        content: normalize(&text, request.text_budget()),
        html: truncate_utf16(&markup, request.html_budget()).to_string(),
        source_url: doc.url().unwrap_or_default(),
    }
}

/// First element matched by the selector chain, else the body
pub fn content_root(doc: &Document, selectors: &[&str]) -> Option<Element> {
    selectors
        .iter()
        .find_map(|selector| match doc.query_selector(selector) {
            Ok(found) => found,
            Err(_) => {
                debug!(selector, "skipping invalid content selector");
                None
            }
        })
        .or_else(|| doc.body().map(Element::from))
        .or_else(|| doc.document_element())
}

fn sanitized_clone(root: &Element) -> Option<Element> {
    let clone: Element = root.clone_node_with_deep(true).ok()?.dyn_into().ok()?;
    if let Ok(doomed) = clone.query_selector_all(STRIPPED_SELECTOR) {
        for i in 0..doomed.length() {
            if let Some(el) = doomed.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                el.remove();
            }
        }
    }
    Some(clone)
}

fn page_title(doc: &Document) -> String {
    doc.query_selector(HEADING_SELECTOR)
        .ok()
        .flatten()
        .and_then(|heading| heading.text_content())
        .map(|t| normalize(&t, MAX_TITLE_LENGTH))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| normalize(&doc.title(), MAX_TITLE_LENGTH))
}
