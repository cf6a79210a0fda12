//! Property tests for reply extraction

use dispatch::interpreter::{Extraction, ResponseExtractor};
use dispatch::ExtractionError;
use proptest::prelude::*;
use serde_json::json;

fn arg_value() -> impl Strategy<Value = String> {
    // braces, quotes and reasoning markers inside values must not confuse the scanner
    let plain = "[a-zA-Z0-9 {}\"'<>/_:,.-]{0,24}";
    let marker = prop::sample::select(vec!["<think>", "</think>", "<think></think>"]);
    prop_oneof![
        3 => plain,
        1 => (plain, marker, plain).prop_map(|(a, m, b)| format!("{}{}{}", a, m, b)),
    ]
}

fn call_json() -> impl Strategy<Value = String> {
    (
        "[a-z_]{1,16}",
        prop::collection::btree_map("[a-z_]{1,10}", arg_value(), 0..4),
    )
        .prop_map(|(name, args)| {
            json!({"function_call": {"name": name, "arguments": args}}).to_string()
        })
}

fn prose() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\n]{0,40}"
}

fn reasoning() -> impl Strategy<Value = String> {
    let thoughts = "[a-zA-Z0-9 {}\\[\\]\":,\n]{0,60}";
    prop_oneof![
        3 => thoughts,
        1 => (thoughts, thoughts)
            .prop_map(|(outer, inner)| format!("{} <think>{}</think> {}", outer, inner, outer)),
    ]
}

/// Zero or more complete reasoning blocks
fn blocks() -> impl Strategy<Value = String> {
    prop::collection::vec(reasoning(), 0..3).prop_map(|blocks| {
        blocks
            .iter()
            .map(|thoughts| format!("<think>{}</think>\n", thoughts))
            .collect()
    })
}

proptest! {
    #[test]
    fn decoration_does_not_change_the_call(
        bare in call_json(),
        leading in blocks(),
        trailing in blocks(),
        before in prose(),
        after in prose(),
        fenced in any::<bool>(),
    ) {
        let extractor = ResponseExtractor::new();
        let expected = extractor.extract(&bare);
        prop_assert!(matches!(expected, Ok(Extraction::Call(_))));

        let body = if fenced { format!("```json\n{}\n```", bare) } else { bare.clone() };
        let decorated = format!("{}{}{}\n{}{}", leading, before, body, after, trailing);
        prop_assert_eq!(extractor.extract(&decorated), expected);
    }

    #[test]
    fn stripping_leaves_clean_input_unchanged(bare in call_json()) {
        prop_assert_eq!(ResponseExtractor::new().strip_reasoning(&bare), bare);
    }

    #[test]
    fn extraction_is_idempotent_on_clean_input(bare in call_json()) {
        let extractor = ResponseExtractor::new();
        let once = extractor.extract(&bare);
        let fenced_only = extractor.extract(&format!("```\n{}\n```", bare));
        prop_assert_eq!(once, fenced_only);
    }

    #[test]
    fn replies_without_braces_have_no_json(text in "[^{}]{0,200}") {
        prop_assert_eq!(
            ResponseExtractor::new().extract(&text),
            Err(ExtractionError::NoJsonFound)
        );
    }
}
