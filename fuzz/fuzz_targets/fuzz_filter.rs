//! Fuzz target for the JSON filter parser and evaluator.
//!
//! Arbitrary input must never panic: it either parses into a filter or is
//! rejected with a FilterError. Parsed filters must evaluate without
//! panicking and keep their meaning through the canonical JSON form.

#![no_main]

use docmover::filter::Filter;
use libfuzzer_sys::fuzz_target;
use serde_json::{json, Value};

fuzz_target!(|data: (&str, &str)| {
    let (filter_text, doc_text) = data;

    // Should never panic
    let Ok(filter) = Filter::from_json_str(filter_text) else {
        return;
    };

    let doc: Value = serde_json::from_str(doc_text).unwrap_or_else(|_| {
        json!({"payload": doc_text, "_meta": {"stored_type": "t", "inserted_at": 0}})
    });

    let matched = filter.matches(&doc);
    let reparsed = Filter::parse(&filter.to_json()).expect("canonical form must parse");
    assert_eq!(matched, reparsed.matches(&doc));

    // Display is used in logs
    let _ = filter.to_string();
});
