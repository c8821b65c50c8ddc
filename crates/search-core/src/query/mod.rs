//! Query builders: one per query flavor, sharing a common `QueryBuilder`
//! capability instead of a base-class hierarchy (see the "class inheritance
//! between parser and query variants" redesign note).

pub mod entities;
pub mod matching;
pub mod mlt;

use serde_json::{json, Value};

use search_types::{Bucket, SchemaCatalog};

use crate::clauses;
use crate::params::{Auth, ParsedParams, SortDir};
use crate::settings::Settings;

pub use entities::EntitiesQuery;
pub use matching::MatchQuery;
pub use mlt::MoreLikeThisQuery;

/// The capability every query flavor implements. Shared helpers below do the
/// clause assembly; each flavor only decides *which* clauses apply.
pub trait QueryBuilder {
    /// The logical buckets this query should be run against.
    fn buckets(&self) -> Vec<Bucket>;
    fn inner_query(&self) -> Value;
    fn aggs(&self) -> Value;
    fn highlight(&self) -> Option<Value>;
    fn sort(&self) -> Vec<Value>;

    /// Assembles the full `_search` request body: query, aggs, highlight,
    /// sort and pagination together.
    fn to_request_body(&self, offset: usize, limit: usize) -> Value {
        let mut body = json!({
            "query": self.inner_query(),
            "from": offset,
            "size": limit,
        });
        let aggs = self.aggs();
        if aggs.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
            body["aggs"] = aggs;
        }
        if let Some(h) = self.highlight() {
            body["highlight"] = h;
        }
        let sort = self.sort();
        if !sort.is_empty() {
            body["sort"] = json!(sort);
        }
        body
    }
}

/// Builds every active filter clause except the one on `exclude_field` (when
/// set), implementing post-filter isolation for facets that call this with
/// their own field name, and full scoping otherwise.
pub(crate) fn active_filters(parsed: &ParsedParams, settings: &Settings, exclude_field: Option<&str>) -> Vec<Value> {
    let mut filters = Vec::new();

    for (field, values) in &parsed.filters {
        if Some(field.as_str()) == exclude_field {
            continue;
        }
        if field == "schema" || field == "schemata" {
            if let Some(t) = clauses::terms(field, values) {
                filters.push(t);
            }
            continue;
        }
        if field.as_str() == settings.search_auth_field.as_str() || field == "collection_id" {
            continue; // scoped via effective_datasets/effective_collection_ids below
        }
        if let Some(t) = clauses::terms(field, values) {
            filters.push(t);
        }
    }

    if Some(settings.search_auth_field.as_str()) != exclude_field {
        if let Some(t) = clauses::terms(&settings.search_auth_field, &parsed.effective_datasets) {
            filters.push(t);
        }
    }
    if exclude_field != Some("collection_id") && !parsed.effective_collection_ids.is_empty() {
        let ids: Vec<String> = parsed.effective_collection_ids.iter().map(|i| i.to_string()).collect();
        if let Some(t) = clauses::terms("collection_id", &ids) {
            filters.push(t);
        }
    }

    for (field, op, value) in &parsed.ranges {
        if Some(field.as_str()) == exclude_field {
            continue;
        }
        filters.push(clauses::range(field, *op, value));
    }

    for (field, values) in &parsed.exclusions {
        if let Some(t) = clauses::terms(field, values) {
            filters.push(clauses::bool_must_not(vec![t]));
        }
    }
    for field in &parsed.empties {
        filters.push(clauses::bool_must_not(vec![clauses::exists(field)]));
    }

    filters
}

/// Builds the ES `sort` clauses, preferring `numeric.<field>` for properties
/// known to be numeric or date-typed.
pub(crate) fn build_sort(sort: &[(String, SortDir)], catalog: &dyn SchemaCatalog) -> Vec<Value> {
    sort.iter()
        .map(|(field, dir)| {
            let order = match dir {
                SortDir::Asc => "asc",
                SortDir::Desc => "desc",
            };
            let target = if is_numeric_property(catalog, field) {
                format!("numeric.{field}")
            } else {
                field.clone()
            };
            json!({ target: { "order": order } })
        })
        .collect()
}

fn is_numeric_property(catalog: &dyn SchemaCatalog, field: &str) -> bool {
    catalog
        .names()
        .iter()
        .any(|name| catalog.get(name).and_then(|s| s.property(field)).map(|p| p.is_numeric()).unwrap_or(false))
}

/// The per-bucket scoring functions every query flavor's `function_score`
/// wrapper applies: a `num_values` boost plus the configured per-bucket
/// index weight, gated on our own `index_bucket` field.
pub(crate) fn scoring_functions(settings: &Settings) -> Vec<Value> {
    let mut functions = vec![clauses::num_values_factor()];
    for bucket in Bucket::ALL {
        functions.push(clauses::weighted_filter_function(
            clauses::term("index_bucket", bucket.as_str()),
            settings.index_boost(bucket),
        ));
    }
    functions
}

/// Resolves the dataset/collection scoping an `Auth` and `ParsedParams`
/// jointly imply, as a single filter list (used by flavors that build their
/// own filter set rather than going through `active_filters`).
pub(crate) fn auth_scope_filters(parsed: &ParsedParams, settings: &Settings, _auth: Option<&Auth>) -> Vec<Value> {
    let mut filters = Vec::new();
    if let Some(t) = clauses::terms(&settings.search_auth_field, &parsed.effective_datasets) {
        filters.push(t);
    }
    if !parsed.effective_collection_ids.is_empty() {
        let ids: Vec<String> = parsed.effective_collection_ids.iter().map(|i| i.to_string()).collect();
        if let Some(t) = clauses::terms("collection_id", &ids) {
            filters.push(t);
        }
    }
    filters
}
