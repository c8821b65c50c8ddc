//! End-to-end scenarios A-F: literal parameter/entity inputs checked against
//! the resulting request body, since the crate itself never talks to a live
//! cluster (that boundary is the injected `Transport`).

use std::collections::BTreeSet;

use search_core::name::{NameProcessor, StaticNameSymbolDictionary};
use search_core::params::{parse, Auth};
use search_core::query::{EntitiesQuery, MatchQuery, MoreLikeThisQuery, QueryBuilder};
use search_core::{Bucket, Entity, Settings};
use search_types::{InMemorySchemaCatalog, PropertyDescriptor, TypeGroup};

fn demo_catalog() -> InMemorySchemaCatalog {
    InMemorySchemaCatalog::builder()
        .schema("Thing", &[], vec![], false)
        .schema(
            "LegalEntity",
            &["Thing"],
            vec![PropertyDescriptor::new("name", TypeGroup::Name, true)],
            true,
        )
        .schema(
            "Person",
            &["LegalEntity"],
            vec![PropertyDescriptor::new("birthDate", TypeGroup::Date, true)],
            true,
        )
        .schema(
            "Document",
            &["Thing"],
            vec![PropertyDescriptor::new("content", TypeGroup::Text, true)],
            true,
        )
        .build()
}

fn pairs(kvs: &[(&str, &str)]) -> Vec<(String, String)> {
    kvs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// A. Cross-alphabet match: a `MatchQuery` built from the Latin-spelled
/// entity carries a `name_symbols` clause, the mechanism that lets it find
/// the Cyrillic-spelled one at search time.
#[test]
fn cross_alphabet_match_carries_name_symbols_clause() {
    let catalog = demo_catalog();
    let dictionary = StaticNameSymbolDictionary::new();
    let processor = NameProcessor::new(&catalog, &dictionary);
    let settings = Settings::default();
    let parsed = parse(&[], &settings, None).unwrap();

    let latin = Entity::new("e-latin", "Person", "ds").with_property("name", ["Vladimir Putin".to_string()]);

    let query = MatchQuery::build(&latin, &catalog, &processor, &parsed, &settings, None).unwrap();
    let body = query.to_request_body(0, 20);
    let must = body["query"]["function_score"]["query"]["bool"]["must"][0]["bool"]["should"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let has_name_symbols = must.iter().any(|clause| {
        clause.get("term").and_then(|t| t.get("name_symbols")).is_some()
    });
    assert!(has_name_symbols, "expected a name_symbols clause in {must:#?}");
}

/// B. Phonetic match: "Smith" and "Smythe" share a Double Metaphone code, and
/// a `MatchQuery` built from one carries a `name_phonetic` clause that would
/// retrieve the other.
#[test]
fn phonetic_match_shares_code_and_builds_clause() {
    let catalog = demo_catalog();
    let dictionary = StaticNameSymbolDictionary::new();
    let processor = NameProcessor::new(&catalog, &dictionary);

    let smith = processor.represent("Person", &["Smith".to_string()]);
    let smythe = processor.represent("Person", &["Smythe".to_string()]);
    assert!(!smith.name_phonetic.is_empty());
    assert_eq!(smith.name_phonetic, smythe.name_phonetic);

    let settings = Settings::default();
    let parsed = parse(&[], &settings, None).unwrap();
    let entity = Entity::new("e1", "Person", "ds").with_property("name", ["Smythe".to_string()]);
    let query = MatchQuery::build(&entity, &catalog, &processor, &parsed, &settings, None).unwrap();
    let body = query.to_request_body(0, 20);
    let must = body["query"]["function_score"]["query"]["bool"]["must"][0]["bool"]["should"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let has_phonetic = must.iter().any(|clause| clause.get("term").and_then(|t| t.get("name_phonetic")).is_some());
    assert!(has_phonetic, "expected a name_phonetic clause in {must:#?}");
}

/// C. Facet isolation: faceting on `dataset` while also filtering on it must
/// not fold that filter into the facet's own isolated filter set.
#[test]
fn facet_isolation_excludes_its_own_field_filter() {
    let catalog = demo_catalog();
    let settings = Settings::default();
    let parsed = parse(
        &pairs(&[("filter:dataset", "A"), ("filter:dataset", "B"), ("facet", "dataset")]),
        &settings,
        None,
    )
    .unwrap();
    let query = EntitiesQuery::new(&parsed, &settings, &catalog);
    let aggs = query.aggs();
    let isolated = &aggs["dataset"]["filter"];
    let as_text = isolated.to_string();
    assert!(!as_text.contains("\"dataset\""), "facet filter leaked its own field: {isolated}");
}

/// D. Date histogram with bounds: a `gte`/`lt` range on `created_at` plus a
/// monthly facet on the same field carries `extended_bounds` spanning the
/// requested range (ES itself fills empty buckets once queried).
#[test]
fn date_histogram_carries_extended_bounds_from_range_filters() {
    let catalog = demo_catalog();
    let settings = Settings::default();
    let parsed = parse(
        &pairs(&[
            ("filter:gte:created_at", "2023-01-01"),
            ("filter:lt:created_at", "2024-01-01"),
            ("facet", "created_at"),
            ("facet_interval:created_at", "month"),
        ]),
        &settings,
        None,
    )
    .unwrap();
    let query = EntitiesQuery::new(&parsed, &settings, &catalog);
    let aggs = query.aggs();
    let histogram = &aggs["created_at"]["aggs"]["created_at"]["date_histogram"];
    assert_eq!(histogram["calendar_interval"], serde_json::json!("month"));
    assert_eq!(histogram["min_doc_count"], serde_json::json!(0));
    assert_eq!(histogram["extended_bounds"]["min"], serde_json::json!("2023-01-01"));
    assert_eq!(histogram["extended_bounds"]["max"], serde_json::json!("2024-01-01"));
}

/// E. MLT targets documents/pages only: a `MoreLikeThisQuery` never declares
/// Things/Intervals among its buckets, so a Person can never come back from
/// it regardless of textual similarity.
#[test]
fn mlt_only_targets_document_and_page_buckets() {
    let catalog = demo_catalog();
    let settings = Settings::default();
    let parsed = parse(&[], &settings, None).unwrap();
    let entity = Entity::new("doc-1", "Document", "ds").with_property("content", ["shared text".to_string()]);

    let query = MoreLikeThisQuery::build(&entity, &catalog, &parsed, &settings, None).unwrap();
    let buckets = query.buckets();
    assert_eq!(buckets, vec![Bucket::Documents, Bucket::Pages]);

    let body = query.to_request_body(0, 20);
    let filter = body["query"]["function_score"]["query"]["bool"]["filter"].clone();
    let schema_terms = filter
        .as_array()
        .unwrap()
        .iter()
        .find_map(|f| f.get("terms").and_then(|t| t.get("schema")))
        .cloned()
        .unwrap();
    let schema_terms: Vec<String> = serde_json::from_value(schema_terms).unwrap();
    assert!(!schema_terms.iter().any(|s| s == "Person"));
}

/// F. Auth scoping: a caller restricted to dataset A requesting A and B gets
/// a filter scoped to A alone.
#[test]
fn auth_scoping_intersects_requested_datasets_with_allowed() {
    let mut settings = Settings::default();
    settings.search_auth = true;
    let auth = Auth::scoped_to_datasets(BTreeSet::from(["A".to_string()]));
    let parsed = parse(&pairs(&[("filter:dataset", "A"), ("filter:dataset", "B")]), &settings, Some(&auth)).unwrap();

    assert_eq!(parsed.effective_datasets, vec!["A".to_string()]);

    let catalog = demo_catalog();
    let query = EntitiesQuery::new(&parsed, &settings, &catalog);
    let inner = query.inner_query();
    let filter = inner["function_score"]["query"]["bool"]["filter"].clone();
    let dataset_terms = filter
        .as_array()
        .unwrap()
        .iter()
        .find_map(|f| f.get("terms").and_then(|t| t.get("dataset")))
        .cloned()
        .unwrap();
    let dataset_terms: Vec<String> = serde_json::from_value(dataset_terms).unwrap();
    assert_eq!(dataset_terms, vec!["A".to_string()]);
}

/// Authentication is required once `search_auth` is on: a caller with no
/// `Auth` at all is rejected before any query is built (§7 error kind 1).
#[test]
fn missing_auth_is_rejected_when_search_auth_is_enabled() {
    let mut settings = Settings::default();
    settings.search_auth = true;
    let err = parse(&[], &settings, None).unwrap_err();
    assert!(matches!(err, search_core::Error::AuthRequired));
}
