//! `EntitiesQuery`: full-text search with filters, facets and highlighting.

use serde_json::{json, Value};

use search_types::{Bucket, SchemaCatalog};

use crate::aggregations;
use crate::clauses::{self, BoolQuery};
use crate::highlight;
use crate::params::ParsedParams;
use crate::settings::Settings;

use super::{active_filters, build_sort, scoring_functions, QueryBuilder};

/// Fields eligible for the highlight query's group-field `multi_match`
/// fallback and for preferring `numeric.*` on sort -- kept here rather than
/// hard-coded in `highlight`/`query` so the set can grow with the schema.
const GROUP_FIELDS: &[&str] = &[
    "countries", "languages", "emails", "phones", "dates", "addresses", "ips", "urls", "identifiers", "checksums",
    "entities", "genders", "mimetypes", "topics",
];

pub struct EntitiesQuery<'a> {
    pub parsed: &'a ParsedParams,
    pub settings: &'a Settings,
    pub catalog: &'a dyn SchemaCatalog,
}

impl<'a> EntitiesQuery<'a> {
    pub fn new(parsed: &'a ParsedParams, settings: &'a Settings, catalog: &'a dyn SchemaCatalog) -> Self {
        EntitiesQuery { parsed, settings, catalog }
    }

    fn authenticated(&self) -> bool {
        !self.parsed.effective_datasets.is_empty() || !self.parsed.effective_collection_ids.is_empty()
    }

    fn is_date_field(&self, field: &str) -> bool {
        if field.ends_with("_at") || field == "dates" {
            return true;
        }
        self.catalog
            .names()
            .iter()
            .any(|name| {
                self.catalog
                    .get(name)
                    .and_then(|s| s.property(field))
                    .map(|p| matches!(p.type_group, search_types::TypeGroup::Date))
                    .unwrap_or(false)
            })
    }

    fn date_bounds_for(&self, field: &str) -> Option<(String, String)> {
        let mut min = None;
        let mut max = None;
        for (range_field, op, value) in &self.parsed.ranges {
            if range_field != field {
                continue;
            }
            match op {
                clauses::RangeOp::Gte | clauses::RangeOp::Gt => min = Some(value.clone()),
                clauses::RangeOp::Lte | clauses::RangeOp::Lt => max = Some(value.clone()),
            }
        }
        match (min, max) {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

impl<'a> QueryBuilder for EntitiesQuery<'a> {
    fn buckets(&self) -> Vec<Bucket> {
        Bucket::ALL.to_vec()
    }

    fn inner_query(&self) -> Value {
        let mut bool_query = BoolQuery::new();

        if let Some(q) = &self.parsed.q {
            bool_query.must.push(clauses::query_string(q, None));
        }
        if let Some(prefix) = &self.parsed.prefix {
            bool_query.should.push(clauses::prefix("name", prefix));
        }

        bool_query.filter = active_filters(self.parsed, self.settings, None);

        let query = bool_query.into_value();

        if self.settings.query_function_score {
            clauses::function_score(query, scoring_functions(self.settings), "sum")
        } else {
            query
        }
    }

    fn aggs(&self) -> Value {
        let mut aggs = serde_json::Map::new();
        let authenticated = self.authenticated();

        for spec in &self.parsed.facets {
            let isolated = json!({ "bool": { "filter": active_filters(self.parsed, self.settings, Some(&spec.field)) } });
            let is_date = self.is_date_field(&spec.field);
            let bounds = if is_date { self.date_bounds_for(&spec.field) } else { None };
            let (name, agg) =
                aggregations::build_facet_aggregation(&spec.field, spec, isolated, self.settings, authenticated, is_date, bounds);
            aggs.insert(name, agg);
        }

        let scope_present = !self.parsed.effective_datasets.is_empty() || !self.parsed.effective_collection_ids.is_empty();
        let background = aggregations::background_filter(&self.settings.search_auth_field, &self.parsed.effective_datasets);
        let sampler_kind = aggregations::choose_sampler_kind(scope_present, self.settings, None);

        for spec in &self.parsed.significant_terms {
            let (name, agg) = aggregations::build_significant_terms_aggregation(
                &spec.field,
                spec,
                background.clone(),
                sampler_kind,
                self.settings,
                &self.settings.search_auth_field,
            );
            aggs.insert(name, agg);
        }

        if let Some(spec) = &self.parsed.significant_text {
            let (name, agg) = aggregations::build_significant_text_aggregation(
                spec,
                background,
                sampler_kind,
                self.settings,
                &self.settings.search_auth_field,
            );
            aggs.insert(name, agg);
        }

        Value::Object(aggs)
    }

    fn highlight(&self) -> Option<Value> {
        if !self.parsed.highlight {
            return None;
        }
        let q = self.parsed.q.as_deref().unwrap_or("");
        let highlight_query = highlight::build_highlight_query(q, &self.parsed.filters, GROUP_FIELDS);
        Some(highlight::build_highlight_block(
            &["content", "name", "names", "text"],
            self.settings,
            self.parsed.max_highlight_analyzed_offset,
            Some(highlight_query),
        ))
    }

    fn sort(&self) -> Vec<Value> {
        build_sort(&self.parsed.sort, self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse;
    use search_types::InMemorySchemaCatalog;

    fn catalog() -> InMemorySchemaCatalog {
        InMemorySchemaCatalog::builder().schema("Thing", &[], vec![], false).build()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn builds_function_score_wrapper_by_default() {
        let settings = Settings::default();
        let catalog = catalog();
        let parsed = parse(&pairs(&[("q", "putin")]), &settings, None).unwrap();
        let query = EntitiesQuery::new(&parsed, &settings, &catalog);
        let body = query.to_request_body(parsed.offset, parsed.limit);
        assert!(body["query"]["function_score"].is_object());
    }

    #[test]
    fn facet_filter_excludes_own_field() {
        let settings = Settings::default();
        let catalog = catalog();
        let parsed = parse(&pairs(&[("filter:dataset", "A"), ("filter:dataset", "B"), ("facet", "dataset")]), &settings, None).unwrap();
        let query = EntitiesQuery::new(&parsed, &settings, &catalog);
        let aggs = query.aggs();
        let isolated_filter = &aggs["dataset"]["filter"];
        let dump = isolated_filter.to_string();
        assert!(!dump.contains("\"dataset\":[\"A\",\"B\"]"));
    }

    #[test]
    fn highlight_is_absent_unless_requested() {
        let settings = Settings::default();
        let catalog = catalog();
        let parsed = parse(&pairs(&[("q", "putin")]), &settings, None).unwrap();
        let query = EntitiesQuery::new(&parsed, &settings, &catalog);
        assert!(query.highlight().is_none());
    }
}
