//! Text canonicalization for page snapshots.
//!
//! Lengths are counted in UTF-16 code units, the unit a JavaScript receiver
//! observes as `string.length`. Cuts never split a surrogate pair, so a cut
//! string may come out one unit shorter than the budget.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const ZERO_WIDTH_SPACE: char = '\u{200B}';
const NO_BREAK_SPACE: char = '\u{00A0}';

/// Canonicalize raw page text and cut it to `max_len` UTF-16 units.
///
/// A `max_len` of zero means no cut.
pub fn normalize(raw: &str, max_len: usize) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text: String = raw
        .chars()
        .filter(|&c| c != ZERO_WIDTH_SPACE)
        .map(|c| if c == NO_BREAK_SPACE { ' ' } else { c })
        .collect();
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = TRAILING_HSPACE.replace_all(&text, "\n");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    let text = text.trim();

    if max_len == 0 {
        return text.to_string();
    }
    truncate_utf16(text, max_len).trim_end().to_string()
}

/// Length of `s` in UTF-16 code units
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Longest prefix of `s` that fits in `max_len` UTF-16 code units
pub fn truncate_utf16(s: &str, max_len: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        used += c.len_utf16();
        if used > max_len {
            return &s[..idx];
        }
    }
    s
}

/// Byte offset in `s` of the UTF-16 offset `units`, clamped to the end and
/// rounded down to a char boundary.
pub fn byte_offset_utf16(s: &str, units: usize) -> usize {
    truncate_utf16(s, units).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize("", 100), "");
        assert_eq!(normalize("   \n\n  ", 100), "");
    }

    #[test]
    fn test_strips_zero_width_and_nbsp() {
        assert_eq!(normalize("a\u{200B}b\u{00A0}c", 0), "ab c");
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(normalize("one\r\ntwo\rthree\n", 0), "one\ntwo\nthree");
    }

    #[test]
    fn test_trailing_space_before_newline() {
        assert_eq!(normalize("alpha  \t\nbeta \n", 0), "alpha\nbeta");
    }

    #[test]
    fn test_collapses_blank_runs() {
        assert_eq!(normalize("a\n\n\n\n\nb", 0), "a\n\nb");
        assert_eq!(normalize("a\n \n\t\n \nb", 0), "a\n\nb");
        assert_eq!(normalize("a\n\nb", 0), "a\n\nb");
    }

    #[test]
    fn test_cut_to_budget() {
        assert_eq!(normalize("  hello world  ", 5), "hello");
        assert_eq!(normalize("abc def", 4), "abc");
    }

    #[test]
    fn test_cut_keeps_surrogate_pairs_whole() {
        // U+1F600 takes two UTF-16 units
        let s = "ab\u{1F600}";
        assert_eq!(truncate_utf16(s, 3), "ab");
        assert_eq!(truncate_utf16(s, 4), s);
        assert_eq!(utf16_len(s), 4);
    }

    #[test]
    fn test_byte_offset_utf16() {
        let s = "é\u{1F600}x";
        assert_eq!(byte_offset_utf16(s, 0), 0);
        assert_eq!(byte_offset_utf16(s, 1), 2);
        assert_eq!(byte_offset_utf16(s, 3), 6);
        assert_eq!(byte_offset_utf16(s, 99), s.len());
    }
}
