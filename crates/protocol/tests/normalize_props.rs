use proptest::prelude::*;

use promptdock_protocol::text::{normalize, utf16_len};

const ZERO_WIDTH_SPACE: char = '\u{200B}';
const NO_BREAK_SPACE: char = '\u{00A0}';

fn page_text() -> impl Strategy<Value = String> {
    let pieces = prop_oneof![
        "[a-zA-Z0-9 .,]{0,12}",
        Just(ZERO_WIDTH_SPACE.to_string()),
        Just(NO_BREAK_SPACE.to_string()),
        Just("\r\n".to_string()),
        Just("\r".to_string()),
        Just("\n".to_string()),
        Just(" \t".to_string()),
        Just("\u{1F600}".to_string()),
        Just("é".to_string()),
    ];
    prop::collection::vec(pieces, 0..40).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in page_text(), budget in 0usize..64) {
        let once = normalize(&raw, budget);
        prop_assert_eq!(normalize(&once, budget), once.clone());
    }

    #[test]
    fn normalize_respects_budget(raw in page_text(), budget in 1usize..64) {
        prop_assert!(utf16_len(&normalize(&raw, budget)) <= budget);
    }

    #[test]
    fn normalize_output_is_canonical(raw in page_text()) {
        let out = normalize(&raw, 0);
        prop_assert!(!out.contains("\n\n\n"));
        prop_assert!(!out.contains(ZERO_WIDTH_SPACE), "zero-width space kept in {:?}", out);
        prop_assert!(!out.contains(NO_BREAK_SPACE), "no-break space kept in {:?}", out);
        prop_assert!(!out.contains('\r'));
        prop_assert!(!out.contains(" \n"));
        prop_assert!(!out.contains("\t\n"));
        prop_assert_eq!(out.trim(), out.as_str());
    }

    #[test]
    fn normalize_arbitrary_strings_is_idempotent(raw in any::<String>()) {
        let once = normalize(&raw, 0);
        prop_assert_eq!(normalize(&once, 0), once.clone());
    }
}
