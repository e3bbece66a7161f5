//! Domain-specific assertions for LeafSync tests

use leaf_sync::MemoryDocument;
use predicates::prelude::*;

/// stderr does NOT contain any of the given strings
pub fn stderr_not_contains(values: &[&str]) -> impl Predicate<str> {
    let owned_values: Vec<String> = values.iter().map(|&s| s.to_string()).collect();
    predicate::function(move |s: &str| !owned_values.iter().any(|v| s.contains(v.as_str())))
}

/// Output looks like a JSON edit list (`[]` or objects with from/to/insert)
pub fn edit_list_json() -> impl Predicate<str> {
    predicate::function(|s: &str| {
        let trimmed = s.trim();
        trimmed.starts_with('[')
            && trimmed.ends_with(']')
            && (trimmed == "[]"
                || (trimmed.contains("\"from\"")
                    && trimmed.contains("\"to\"")
                    && trimmed.contains("\"insert\"")))
    })
}

/// Both documents hold `expected`
#[track_caller]
pub fn assert_converged(local: &MemoryDocument, remote: &MemoryDocument, expected: &str) {
    assert_eq!(local.text(), expected, "local document diverged");
    assert_eq!(remote.text(), expected, "remote document diverged");
}
