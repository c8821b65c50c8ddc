//! Analyzer, normalizer and character filter definitions shared by every
//! bucket index's mapping.

use serde_json::{json, Value};

/// BM25 similarity tuned for the `name` field: a shallower length norm than
/// the ES default so short and long names are not penalized so differently.
pub const WEAK_LENGTH_NORM: &str = "weak_length_norm";

pub fn char_filters() -> Value {
    json!({
        "remove_punctuation": {
            "type": "pattern_replace",
            "pattern": "[^\\p{L}\\p{N}]",
            "replacement": " ",
        },
        "squash_spaces": {
            "type": "pattern_replace",
            "pattern": "\\s+",
            "replacement": " ",
        },
        "remove_html_tags": {
            "type": "pattern_replace",
            "pattern": "<[^>]*>",
            "replacement": " ",
        },
    })
}

pub fn normalizers() -> Value {
    json!({
        "icu-default": {
            "type": "custom",
            "filter": ["icu_folding"],
        },
        "name-kw-normalizer": {
            "type": "custom",
            "char_filter": ["remove_punctuation", "squash_spaces"],
            "filter": ["lowercase", "asciifolding", "trim"],
        },
        "kw-normalizer": {
            "type": "custom",
            "char_filter": ["remove_html_tags", "squash_spaces"],
            "filter": ["trim"],
        },
    })
}

pub fn analyzers() -> Value {
    json!({
        "icu-default": {
            "type": "custom",
            "tokenizer": "icu_tokenizer",
            "char_filter": ["remove_html_tags"],
            "filter": ["icu_folding", "icu_normalizer"],
        },
        "strip-html": {
            "type": "custom",
            "tokenizer": "standard",
            "char_filter": ["remove_html_tags"],
            "filter": ["lowercase", "asciifolding", "trim"],
        },
    })
}

pub fn similarity() -> Value {
    json!({
        WEAK_LENGTH_NORM: {
            "type": "BM25",
            "b": 0.25,
        }
    })
}
