//! Property-based checks for the quantified invariants in the testable
//! properties section: name-key normalization invariance, `pick_names`
//! cardinality, `num_values`/`schemata` bookkeeping, and the `MatchQuery`
//! clause budget and self-exclusion.

use std::collections::BTreeSet;

use chrono::Utc;
use proptest::prelude::*;

use search_core::document::build_document;
use search_core::name::{name_keys, pick_names, NameProcessor, StaticNameSymbolDictionary};
use search_core::params::parse;
use search_core::query::{MatchQuery, QueryBuilder};
use search_core::{Entity, Settings};
use search_types::{bucket_for_schema, InMemorySchemaCatalog, PropertyDescriptor, TypeGroup};

fn catalog() -> InMemorySchemaCatalog {
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
            vec![
                PropertyDescriptor::new("birthDate", TypeGroup::Date, true),
                PropertyDescriptor::new("idNumber", TypeGroup::Identifier, true),
                PropertyDescriptor::new("country", TypeGroup::Country, true),
            ],
            true,
        )
        .build()
}

fn ascii_name() -> impl Strategy<Value = String> {
    "[A-Za-z]{2,12}( [A-Za-z]{2,12}){0,2}"
}

proptest! {
    /// Invariant 4: `name_keys` is invariant under case changes and
    /// ASCII-foldable diacritics.
    #[test]
    fn name_keys_case_invariant(name in ascii_name()) {
        let lower = name_keys("Person", &[name.to_lowercase()]);
        let upper = name_keys("Person", &[name.to_uppercase()]);
        prop_assert_eq!(lower, upper);
    }

    /// Invariant 5: `pick_names` never returns more than `min(k, |names|)`.
    #[test]
    fn pick_names_respects_cardinality_bound(names in prop::collection::vec(ascii_name(), 0..10), limit in 0usize..6) {
        let picked = pick_names(&names, limit);
        prop_assert!(picked.len() <= limit.min(names.len()));
    }

    /// Invariant 2: `indexed(E).schemata` is the entity's ancestor closure,
    /// and `num_values` is the total count of property values.
    #[test]
    fn document_schemata_and_num_values_match_entity(
        extra_names in prop::collection::vec(ascii_name(), 0..4),
        extra_countries in prop::collection::vec("[a-z]{2}", 0..3),
    ) {
        let catalog = catalog();
        let dictionary = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dictionary);

        let mut entity = Entity::new("e1", "Person", "ds");
        if !extra_names.is_empty() {
            entity = entity.with_property("name", extra_names.clone());
        }
        if !extra_countries.is_empty() {
            entity = entity.with_property("country", extra_countries.clone());
        }

        let bucket = bucket_for_schema(&catalog, &entity.schema);
        let doc = build_document(&entity, &catalog, &processor, bucket, "v1", Utc::now()).unwrap();

        let expected_schemata: BTreeSet<String> = catalog.get("Person").unwrap().schemata.iter().cloned().collect();
        let actual_schemata: BTreeSet<String> = doc.schemata.iter().cloned().collect();
        prop_assert_eq!(actual_schemata, expected_schemata);

        let expected_num_values: usize = entity.properties.values().map(|v| v.len()).sum();
        prop_assert_eq!(doc.num_values, expected_num_values);
    }

    /// Invariant 6: `MatchQuery` never exceeds `MAX_CLAUSES` total clauses
    /// across its `should` list, and always excludes the source id.
    #[test]
    fn match_query_respects_clause_budget(extra_values in prop::collection::vec("[a-z]{3,8}", 0..40)) {
        let catalog = catalog();
        let dictionary = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dictionary);
        let settings = Settings::default();
        let parsed = parse(&[], &settings, None).unwrap();

        let mut entity = Entity::new("seed", "Person", "ds").with_property("name", ["Jane Doe".to_string()]);
        if !extra_values.is_empty() {
            entity = entity.with_property("idNumber", extra_values.clone());
        }

        let query = MatchQuery::build(&entity, &catalog, &processor, &parsed, &settings, None).unwrap();
        let body = query.to_request_body(0, 20);
        let must_not = body["query"]["function_score"]["query"]["bool"]["must_not"].clone();
        let dump = must_not.to_string();
        prop_assert!(dump.contains("\"seed\""));

        let should_len = body["query"]["function_score"]["query"]["bool"]["should"]
            .as_array()
            .map(|a| a.len())
            .unwrap_or(0);
        prop_assert!(should_len <= search_core::settings::MAX_CLAUSES);
    }
}
