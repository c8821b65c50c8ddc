//! `MoreLikeThisQuery`: find documents/pages textually similar to a given
//! entity, restricted to the `Documents` and `Pages` buckets.

use serde_json::{json, Value};

use search_types::{bucket_for_schema, Bucket, Entity, SchemaCatalog};

use crate::clauses::{self, BoolQuery};
use crate::error::Error;
use crate::params::{Auth, MltParams, ParsedParams};
use crate::settings::Settings;
use crate::Result;

use super::{auth_scope_filters, scoring_functions, QueryBuilder};

pub struct MoreLikeThisQuery {
    query: Value,
}

impl MoreLikeThisQuery {
    /// Builds the `MoreLikeThisQuery` for `entity`. Fails with `Error::Schema`
    /// if the entity's schema is unknown to the catalog; unlike `MatchQuery`,
    /// MLT does not require the schema to be matchable, since similarity
    /// here is purely textual.
    pub fn build(entity: &Entity, catalog: &dyn SchemaCatalog, parsed: &ParsedParams, settings: &Settings, auth: Option<&Auth>) -> Result<Self> {
        catalog.get(&entity.schema).ok_or_else(|| Error::Schema { schema: entity.schema.clone() })?;

        let mlt = &parsed.mlt;
        let mut more_like_this = json!({
            "fields": ["content", "text", "name", "names"],
            "like": [{ "_id": entity.id }],
        });
        let mlt_obj = more_like_this.as_object_mut().expect("object");
        if let Some(v) = mlt.min_doc_freq {
            mlt_obj.insert("min_doc_freq".to_string(), json!(v));
        }
        if let Some(v) = mlt.min_term_freq {
            mlt_obj.insert("min_term_freq".to_string(), json!(v));
        }
        if let Some(v) = mlt.max_query_terms {
            mlt_obj.insert("max_query_terms".to_string(), json!(v));
        }
        if let Some(v) = &mlt.minimum_should_match {
            mlt_obj.insert("minimum_should_match".to_string(), json!(v));
        }

        let target_schemata = document_and_page_schemata(catalog);

        let mut query = BoolQuery::new();
        query.must.push(json!({ "more_like_this": more_like_this }));
        query.must_not.push(clauses::ids(&[entity.id.clone()]));
        query.filter = auth_scope_filters(parsed, settings, auth);
        if let Some(t) = clauses::terms("schema", &target_schemata) {
            query.filter.push(t);
        }

        let inner = query.into_value();
        let wrapped = if settings.query_function_score {
            clauses::function_score(inner, scoring_functions(settings), "sum")
        } else {
            inner
        };

        Ok(MoreLikeThisQuery { query: wrapped })
    }
}

fn document_and_page_schemata(catalog: &dyn SchemaCatalog) -> Vec<String> {
    catalog
        .names()
        .into_iter()
        .filter(|name| matches!(bucket_for_schema(catalog, name), Bucket::Documents | Bucket::Pages))
        .collect()
}

impl QueryBuilder for MoreLikeThisQuery {
    fn buckets(&self) -> Vec<Bucket> {
        vec![Bucket::Documents, Bucket::Pages]
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
