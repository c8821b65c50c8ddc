//! `MatchQuery`: find entities similar to a given candidate entity.

use serde_json::Value;

use search_types::{Entity, SchemaCatalog, TypeGroup};

use crate::clauses::{self, BoolQuery};
use crate::error::{Error, Result};
use crate::name::NameProcessor;
use crate::params::{Auth, ParsedParams};
use crate::settings::{Settings, MAX_CLAUSES};

use super::{auth_scope_filters, scoring_functions, QueryBuilder};

/// Property boosts for the should-block, by type group; unlisted groups get
/// no boost.
fn property_boost(group: TypeGroup) -> Option<f64> {
    match group {
        TypeGroup::Ip | TypeGroup::Url | TypeGroup::Email | TypeGroup::Phone => Some(2.0),
        _ => None,
    }
}

pub struct MatchQuery {
    query: Value,
}

impl MatchQuery {
    /// Builds the `MatchQuery` for `entity`, scoped to its matchable
    /// schemata. Fails with `Error::Schema` if the entity's schema is
    /// unknown or not matchable.
    pub fn build(
        entity: &Entity,
        catalog: &dyn SchemaCatalog,
        processor: &NameProcessor,
        parsed: &ParsedParams,
        settings: &Settings,
        auth: Option<&Auth>,
    ) -> Result<Self> {
        let schema_def = catalog.get(&entity.schema).ok_or_else(|| Error::Schema { schema: entity.schema.clone() })?;
        if !schema_def.matchable {
            return Err(Error::Schema { schema: entity.schema.clone() });
        }
        let matchable_schemata: Vec<String> = catalog.matchable_schemata(&entity.schema).into_iter().collect();

        let names = entity.names();
        let representations = processor.represent(&entity.schema, names);
        let picked_names = processor.pick_names(names, 5);

        let mut name_must = Vec::new();
        for n in &picked_names {
            name_must.push(clauses::match_and_fuzzy("names", n, 3.0));
        }
        for key in &representations.name_keys {
            name_must.push(clauses::term_boosted("name_keys", key, 4.0));
        }
        for part in &representations.name_parts {
            name_must.push(clauses::term_boosted("name_parts", part, 1.0));
        }
        for code in &representations.name_phonetic {
            name_must.push(clauses::term_boosted("name_phonetic", code, 0.8));
        }
        for symbol in &representations.name_symbols {
            name_must.push(clauses::term("name_symbols", symbol));
        }

        let mut query = BoolQuery::new();
        query.must.push(
            BoolQuery {
                should: name_must,
                minimum_should_match: Some(Value::from(1)),
                ..BoolQuery::new()
            }
            .into_value(),
        );

        let mut clause_budget = MAX_CLAUSES.saturating_sub(query.must.len());

        let identifier_should = build_identifier_should(entity, schema_def, &mut clause_budget);
        if !identifier_should.is_empty() {
            query.must.push(
                BoolQuery {
                    should: identifier_should,
                    minimum_should_match: Some(Value::from(0)),
                    ..BoolQuery::new()
                }
                .into_value(),
            );
        }

        query.should = build_property_should(entity, schema_def, &mut clause_budget);

        query.must_not.push(clauses::ids(&[entity.id.clone()]));

        query.filter = auth_scope_filters(parsed, settings, auth);
        if let Some(t) = clauses::terms("schema", &matchable_schemata) {
            query.filter.push(t);
        }

        let inner = query.into_value();
        let wrapped = if settings.query_function_score {
            clauses::function_score(inner, scoring_functions(settings), "sum")
        } else {
            inner
        };

        Ok(MatchQuery { query: wrapped })
    }
}

/// Properties in the `Identifier` type group become a must-block with
/// `minimum_should_match: 0` (they contribute to scoring but never gate the
/// match), boosted at 3.0, capped by the shared clause budget.
fn build_identifier_should(entity: &Entity, schema_def: &search_types::SchemaDef, budget: &mut usize) -> Vec<Value> {
    let mut clauses_out = Vec::new();
    for (prop_name, values) in &entity.properties {
        if *budget == 0 {
            break;
        }
        let Some(descriptor) = schema_def.property(prop_name) else { continue };
        if descriptor.type_group != TypeGroup::Identifier {
            continue;
        }
        for value in values {
            if *budget == 0 {
                break;
            }
            clauses_out.push(clauses::term_boosted(prop_name, value, 3.0));
            *budget -= 1;
        }
    }
    clauses_out
}

/// All other matchable properties become should-clauses, most specific first
/// (fewer distinct values on the entity sort earlier), capped by budget.
fn build_property_should(entity: &Entity, schema_def: &search_types::SchemaDef, budget: &mut usize) -> Vec<Value> {
    let mut candidates: Vec<(&String, &String, TypeGroup)> = Vec::new();
    for (prop_name, values) in &entity.properties {
        let Some(descriptor) = schema_def.property(prop_name) else { continue };
        if !descriptor.is_matchable || descriptor.type_group == TypeGroup::Identifier || descriptor.type_group == TypeGroup::Name {
            continue;
        }
        for value in values {
            candidates.push((prop_name, value, descriptor.type_group));
        }
    }
    // Specificity descending: properties with fewer total values on this
    // entity are more discriminating and sort earlier.
    let value_count = |name: &str| entity.properties.get(name).map(|v| v.len()).unwrap_or(0);
    candidates.sort_by_key(|(name, _, _)| value_count(name));

    let mut out = Vec::new();
    for (prop_name, value, group) in candidates {
        if *budget == 0 {
            break;
        }
        out.push(match property_boost(group) {
            Some(boost) => clauses::term_boosted(prop_name, value, boost),
            None => clauses::term(prop_name, value),
        });
        *budget -= 1;
    }
    out
}

impl QueryBuilder for MatchQuery {
    fn buckets(&self) -> Vec<search_types::Bucket> {
        search_types::Bucket::ALL.to_vec()
    }

    fn inner_query(&self) -> Value {
        self.query.clone()
    }

    fn aggs(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    fn highlight(&self) -> Option<Value> {
        None
    }

    fn sort(&self) -> Vec<Value> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::StaticNameSymbolDictionary;
    use crate::params::parse;
    use search_types::{InMemorySchemaCatalog, PropertyDescriptor};

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

    fn make_entity() -> Entity {
        Entity::new("e1", "Person", "ds")
            .with_property("name", vec!["Vladimir Putin".to_string()])
            .with_property("idNumber", vec!["X123".to_string()])
            .with_property("country", vec!["ru".to_string()])
    }

    #[test]
    fn excludes_self_by_id() {
        let catalog = catalog();
        let dict = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dict);
        let settings = Settings::default();
        let parsed = parse(&[], &settings, None).unwrap();
        let entity = make_entity();
        let query = MatchQuery::build(&entity, &catalog, &processor, &parsed, &settings, None).unwrap();
        let body = query.to_request_body(0, 20);
        let dump = body.to_string();
        assert!(dump.contains("\"must_not\""));
        assert!(dump.contains("\"e1\""));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let catalog = catalog();
        let dict = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dict);
        let settings = Settings::default();
        let parsed = parse(&[], &settings, None).unwrap();
        let entity = Entity::new("e2", "NotASchema", "ds");
        let result = MatchQuery::build(&entity, &catalog, &processor, &parsed, &settings, None);
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn respects_max_clause_budget() {
        let mut builder = InMemorySchemaCatalog::builder().schema("Thing", &[], vec![], false);
        let mut props = vec![PropertyDescriptor::new("name", TypeGroup::Name, true)];
        for i in 0..600 {
            props.push(PropertyDescriptor::new(format!("prop{i}"), TypeGroup::Country, true));
        }
        builder = builder.schema("LegalEntity", &["Thing"], props, true);
        let catalog = builder.build();
        let dict = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dict);
        let settings = Settings::default();
        let parsed = parse(&[], &settings, None).unwrap();
        let mut entity = Entity::new("e3", "LegalEntity", "ds").with_property("name", vec!["Acme".to_string()]);
        for i in 0..600 {
            entity = entity.with_property(format!("prop{i}"), vec!["v".to_string()]);
        }
        let query = MatchQuery::build(&entity, &catalog, &processor, &parsed, &settings, None).unwrap();
        let should = query.inner_query()["function_score"]["query"]["bool"]["should"].as_array().cloned().unwrap_or_default();
        assert!(should.len() <= MAX_CLAUSES);
    }
}
