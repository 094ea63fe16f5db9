//! Text insertion at the caret of a located target
//!
//! Both paths mutate synchronously and fire the `input` event page
//! frameworks listen for. A DOM failure midway is returned as is; there is no
//! rollback.

use web_sys::{HtmlElement, InputEvent, InputEventInit, Range, Selection};

use promptdock_protocol::text::{byte_offset_utf16, utf16_len};

use crate::dom;
use crate::error::{ContentError, Result};
use crate::locator::{InputTarget, PlainField};

/// Insert `text` into `target` at its caret, replacing any selection
pub fn insert(target: &InputTarget, text: &str) -> Result<()> {
    match target {
        InputTarget::Plain(field) => insert_plain(field, text),
        InputTarget::Rich(el) => insert_rich(el, text),
    }
}

/// Replace the UTF-16 range `start..end` of `value` with `insert`.
///
/// Offsets are clamped to the value and ordered. Returns the new value and
/// the caret offset just after the inserted text.
pub fn splice_utf16(value: &str, start: usize, end: usize, insert: &str) -> (String, usize) {
    let from = byte_offset_utf16(value, start.min(end));
    let to = byte_offset_utf16(value, start.max(end));

    let mut out = String::with_capacity(value.len() + insert.len());
    out.push_str(&value[..from]);
    out.push_str(insert);
    out.push_str(&value[to..]);

    let caret = utf16_len(&value[..from]) + utf16_len(insert);
    (out, caret)
}

fn insert_plain(field: &PlainField, text: &str) -> Result<()> {
    let value = field.value();
    let end_of_value = utf16_len(&value);
    let (start, end) = field.selection();
    let start = start.map_or(end_of_value, |s| s as usize);
    let end = end.map_or(end_of_value, |e| e as usize);

    let (next, caret) = splice_utf16(&value, start, end, text);
    field.set_value(&next);
    field.set_caret(u32::try_from(caret).unwrap_or(u32::MAX))?;
    dom::dispatch_input(field.element())
}

fn insert_rich(el: &HtmlElement, text: &str) -> Result<()> {
    let doc = el
        .owner_document()
        .ok_or(ContentError::MissingGlobal("document"))?;
    el.focus()?;
    let selection = dom::window()?
        .get_selection()?
        .ok_or(ContentError::MissingGlobal("selection"))?;

    let range = match range_within(&selection, el) {
        Some(range) => range,
        None => {
            let range = doc.create_range()?;
            range.select_node_contents(el)?;
            range.collapse_with_to_start(false);
            range
        }
    };

    range.delete_contents()?;
    let node = doc.create_text_node(text);
    range.insert_node(&node)?;
    range.set_start_after(&node)?;
    range.collapse_with_to_start(true);
    selection.remove_all_ranges()?;
    selection.add_range(&range)?;

    let init = InputEventInit::new();
    init.set_bubbles(true);
    init.set_data(Some(text));
    init.set_input_type("insertText");
    let event = InputEvent::new_with_event_init_dict("input", &init)?;
    el.dispatch_event(&event)?;
    Ok(())
}

/// The selection's first range, if it lies inside `el`
fn range_within(selection: &Selection, el: &HtmlElement) -> Option<Range> {
    if selection.range_count() == 0 {
        return None;
    }
    let range = selection.get_range_at(0).ok()?;
    let container = range.common_ancestor_container().ok()?;
    el.contains(Some(&container)).then_some(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_at_caret() {
        let (value, caret) = splice_utf16("hello world", 5, 5, "X");
        assert_eq!(value, "helloX world");
        assert_eq!(caret, 6);
    }

    #[test]
    fn test_splice_replaces_selection() {
        let (value, caret) = splice_utf16("hello world", 6, 11, "there");
        assert_eq!(value, "hello there");
        assert_eq!(caret, 11);
    }

    #[test]
    fn test_splice_orders_reversed_offsets() {
        let (value, caret) = splice_utf16("abcdef", 4, 2, "-");
        assert_eq!(value, "ab-ef");
        assert_eq!(caret, 3);
    }

    #[test]
    fn test_splice_clamps_past_end() {
        let (value, caret) = splice_utf16("abc", 10, 10, "d");
        assert_eq!(value, "abcd");
        assert_eq!(caret, 4);
    }

    #[test]
    fn test_splice_counts_utf16_units() {
        // U+1F600 occupies offsets 1..3
        let (value, caret) = splice_utf16("a\u{1F600}b", 3, 3, "é");
        assert_eq!(value, "a\u{1F600}éb");
        assert_eq!(caret, 4);
    }

    #[test]
    fn test_splice_never_splits_surrogate_pair() {
        // Offset 2 falls inside the pair; the cut rounds down to 1
        let (value, caret) = splice_utf16("a\u{1F600}b", 2, 2, "x");
        assert_eq!(value, "ax\u{1F600}b");
        assert_eq!(caret, 2);
    }
}
