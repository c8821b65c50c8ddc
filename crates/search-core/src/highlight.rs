//! Highlight block construction: per-field highlighter selection and the
//! shared fragment/boundary options.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::clauses;
use crate::settings::Settings;

/// Picks the highlighter for `field` per the (field, `content_term_vectors`,
/// `highlighter_fvh_enabled`) rule.
pub fn highlighter_for_field(field: &str, settings: &Settings) -> &'static str {
    match field {
        "content" => {
            if settings.highlighter_fvh_enabled && settings.content_term_vectors {
                "fvh"
            } else {
                "unified"
            }
        }
        "name" => "unified",
        _ => "plain",
    }
}

/// Builds the `highlight` request block for `fields`, with an optional
/// per-request `max_analyzed_offset` override and an optional
/// `highlight_query` (see [`build_highlight_query`]).
pub fn build_highlight_block(
    fields: &[&str],
    settings: &Settings,
    max_analyzed_offset_override: Option<u32>,
    highlight_query: Option<Value>,
) -> Value {
    let mut field_map = serde_json::Map::new();
    for field in fields {
        field_map.insert(field.to_string(), json!({ "type": highlighter_for_field(field, settings) }));
    }

    let mut block = json!({
        "fields": field_map,
        "fragment_size": settings.highlight_fragment_size,
        "number_of_fragments": settings.highlight_number_of_fragments,
        "phrase_limit": settings.highlight_phrase_limit,
        "boundary_scanner": "sentence",
        "boundary_max_scan": settings.highlight_boundary_max_scan,
        "no_match_size": settings.highlight_no_match_size,
        "max_analyzed_offset": max_analyzed_offset_override.unwrap_or(settings.highlight_max_analyzed_offset),
        "pre_tags": ["<em>"],
        "post_tags": ["</em>"],
        "order": "score",
    });

    if let Some(hq) = highlight_query {
        block["highlight_query"] = hq;
    }

    block
}

/// The highlight query: the bare `query_string` when there are no filters,
/// or a `should` wrapping it plus a `multi_match` per value of every filter
/// on a group field or `name`, so highlighted snippets reflect filter
/// matches too.
pub fn build_highlight_query(q: &str, filters: &BTreeMap<String, Vec<String>>, group_fields: &[&str]) -> Value {
    let query_string = clauses::query_string(q, None);
    if filters.is_empty() {
        return query_string;
    }

    let mut should = vec![query_string];
    for (field, values) in filters {
        if group_fields.contains(&field.as_str()) || field == "name" {
            for value in values {
                should.push(json!({ "multi_match": { "query": value, "fields": ["content", "text", "name"] } }));
            }
        }
    }
    json!({ "bool": { "should": should } })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_uses_fvh_when_term_vectors_and_fvh_enabled() {
        let settings = Settings::default();
        assert_eq!(highlighter_for_field("content", &settings), "fvh");
    }

    #[test]
    fn content_falls_back_to_unified_without_term_vectors() {
        let mut settings = Settings::default();
        settings.content_term_vectors = false;
        assert_eq!(highlighter_for_field("content", &settings), "unified");
    }

    #[test]
    fn name_is_always_unified_others_are_plain() {
        let settings = Settings::default();
        assert_eq!(highlighter_for_field("name", &settings), "unified");
        assert_eq!(highlighter_for_field("names", &settings), "plain");
    }

    #[test]
    fn highlight_query_adds_multi_match_for_group_field_filters() {
        let mut filters = BTreeMap::new();
        filters.insert("countries".to_string(), vec!["ru".to_string()]);
        let hq = build_highlight_query("putin", &filters, &["countries"]);
        assert_eq!(hq["bool"]["should"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn highlight_query_is_bare_query_string_without_filters() {
        let filters = BTreeMap::new();
        let hq = build_highlight_query("putin", &filters, &["countries"]);
        assert_eq!(hq["query_string"]["query"], json!("putin"));
    }
}
