//! Low-level Elasticsearch JSON fragment assemblers.
//!
//! Every query builder composes request bodies from these helpers instead of
//! hand-writing `json!` blocks inline, so the same `term`/`terms`/`range`
//! shape is produced everywhere.

use serde_json::{json, Value};

/// `{"term": {field: {"value": value, "boost": boost}}}`.
pub fn term_boosted(field: &str, value: &str, boost: f64) -> Value {
    json!({ "term": { field: { "value": value, "boost": boost } } })
}

/// `{"term": {field: value}}`, no boost.
pub fn term(field: &str, value: &str) -> Value {
    json!({ "term": { field: value } })
}

/// `{"terms": {field: values}}`. Returns `None` when `values` is empty --
/// ES rejects empty `terms` clauses, and an omitted filter is the correct
/// "no constraint" representation.
pub fn terms(field: &str, values: &[String]) -> Option<Value> {
    if values.is_empty() {
        None
    } else {
        Some(json!({ "terms": { field: values } }))
    }
}

/// `{"ids": {"values": ids}}`.
pub fn ids(ids: &[String]) -> Value {
    json!({ "ids": { "values": ids } })
}

/// `{"exists": {"field": field}}`.
pub fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

/// One side of a range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }
}

/// `{"range": {field: {op: value}}}`.
pub fn range(field: &str, op: RangeOp, value: &str) -> Value {
    json!({ "range": { field: { op.as_str(): value } } })
}

/// Merges several range bounds on the same field into one `range` clause,
/// e.g. `gte` + `lt` on `created_at`.
pub fn range_merged(field: &str, bounds: &[(RangeOp, String)]) -> Option<Value> {
    if bounds.is_empty() {
        return None;
    }
    let mut inner = serde_json::Map::new();
    for (op, value) in bounds {
        inner.insert(op.as_str().to_string(), Value::String(value.clone()));
    }
    Some(json!({ "range": { field: inner } }))
}

/// `{"match": {field: {"query": value, "operator": "AND", "fuzziness": "AUTO", "boost": boost}}}`.
pub fn match_and_fuzzy(field: &str, value: &str, boost: f64) -> Value {
    json!({
        "match": {
            field: {
                "query": value,
                "operator": "AND",
                "fuzziness": "AUTO",
                "boost": boost,
            }
        }
    })
}

/// `{"query_string": {"query": q, "default_operator": "AND"}}`, optionally
/// scoped to `fields`.
pub fn query_string(q: &str, fields: Option<&[&str]>) -> Value {
    let mut body = json!({ "query": q, "default_operator": "AND" });
    if let Some(fields) = fields {
        body["fields"] = json!(fields);
    }
    json!({ "query_string": body })
}

/// `{"prefix": {field: {"value": value}}}`.
pub fn prefix(field: &str, value: &str) -> Value {
    json!({ "prefix": { field: { "value": value } } })
}

/// Wraps `must_not` filters: `{"bool": {"must_not": clauses}}`.
pub fn bool_must_not(clauses: Vec<Value>) -> Value {
    json!({ "bool": { "must_not": clauses } })
}

/// A `bool` query assembled from its constituent clause lists. Empty lists
/// are omitted rather than serialized as `[]`, matching how ES treats an
/// absent clause differently from an empty one in some contexts and keeping
/// bodies uncluttered.
#[derive(Debug, Clone, Default)]
pub struct BoolQuery {
    pub must: Vec<Value>,
    pub should: Vec<Value>,
    pub filter: Vec<Value>,
    pub must_not: Vec<Value>,
    pub minimum_should_match: Option<Value>,
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn into_value(self) -> Value {
        let mut inner = serde_json::Map::new();
        if !self.must.is_empty() {
            inner.insert("must".to_string(), json!(self.must));
        }
        if !self.should.is_empty() {
            inner.insert("should".to_string(), json!(self.should));
        }
        if !self.filter.is_empty() {
            inner.insert("filter".to_string(), json!(self.filter));
        }
        if !self.must_not.is_empty() {
            inner.insert("must_not".to_string(), json!(self.must_not));
        }
        if let Some(msm) = self.minimum_should_match {
            inner.insert("minimum_should_match".to_string(), msm);
        }
        json!({ "bool": inner })
    }
}

/// `field_value_factor` score function on `num_values`, used by every query
/// flavor's `function_score` wrapper.
pub fn num_values_factor() -> Value {
    json!({
        "field_value_factor": {
            "field": "num_values",
            "factor": 0.5,
            "modifier": "sqrt",
            "missing": 0,
        }
    })
}

/// A scoring function gated by a filter, e.g. the per-bucket index boost.
pub fn weighted_filter_function(filter: Value, weight: f64) -> Value {
    json!({ "filter": filter, "weight": weight })
}

/// Wraps `query` in a `function_score` with the given additional functions
/// and `boost_mode`.
pub fn function_score(query: Value, functions: Vec<Value>, boost_mode: &str) -> Value {
    json!({
        "function_score": {
            "query": query,
            "functions": functions,
            "boost_mode": boost_mode,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_omits_empty_value_lists() {
        assert!(terms("dataset", &[]).is_none());
        assert_eq!(
            terms("dataset", &["a".to_string()]).unwrap(),
            json!({ "terms": { "dataset": ["a"] } })
        );
    }

    #[test]
    fn range_merged_combines_bounds() {
        let merged = range_merged(
            "created_at",
            &[(RangeOp::Gte, "2023-01-01".to_string()), (RangeOp::Lt, "2024-01-01".to_string())],
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({ "range": { "created_at": { "gte": "2023-01-01", "lt": "2024-01-01" } } })
        );
    }

    #[test]
    fn bool_query_omits_empty_clause_lists() {
        let mut b = BoolQuery::new();
        b.filter.push(term("schema", "Person"));
        assert_eq!(b.into_value(), json!({ "bool": { "filter": [{ "term": { "schema": "Person" } }] } }));
    }

    #[test]
    fn term_boosted_matches_teacher_shape() {
        assert_eq!(
            term_boosted("name_keys", "putinvladimir", 4.0),
            json!({ "term": { "name_keys": { "value": "putinvladimir", "boost": 4.0 } } })
        );
    }
}
