//! The index settings + mapping generator (spec component "Mapping
//! builder"): analyzers, normalizers, BM25 similarity, `_source` excludes
//! and per-property field typing with `copy_to` wiring.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use search_types::{Bucket, SchemaCatalog, TypeGroup};

use crate::dates::date_format_pattern;
use crate::mapping::analyzers;
use crate::settings::Settings;

/// Every group field name a property's type group may copy into, used to
/// compute `_source.excludes` alongside the derived name/content fields.
const GROUP_FIELDS: &[&str] = &[
    "countries", "languages", "emails", "phones", "dates", "addresses", "ips", "urls", "identifiers", "checksums",
    "entities", "genders", "mimetypes", "topics",
];

const DERIVED_FIELDS: &[&str] = &["content", "text", "name", "name_keys", "name_parts", "name_symbols", "name_phonetic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EsType {
    Text,
    Date,
    Keyword,
}

impl EsType {
    fn for_type_group(group: TypeGroup) -> EsType {
        if group.is_text() {
            EsType::Text
        } else if matches!(group, TypeGroup::Date) {
            EsType::Date
        } else {
            EsType::Keyword
        }
    }
}

/// Builds the full create-index body (`settings` + `mappings`) for one
/// bucket at the configured shard count and content options.
pub fn build_index_body(catalog: &dyn SchemaCatalog, settings: &Settings, bucket: Bucket) -> Value {
    let shards = ((settings.index_shards as f64) * bucket.shard_fraction()).round().max(1.0) as u64;

    let mut source_excludes: Vec<&str> = GROUP_FIELDS.to_vec();
    source_excludes.extend_from_slice(DERIVED_FIELDS);
    source_excludes.sort_unstable();

    let mut properties = static_properties(settings, bucket);
    let (property_fields, numeric_fields) = schema_property_fields(catalog, bucket);
    properties["properties"] = json!({ "properties": property_fields });
    properties["numeric"] = json!({ "properties": numeric_fields });

    json!({
        "settings": {
            "index": {
                "number_of_shards": shards,
                "number_of_replicas": settings.index_replicas,
                "refresh_interval": settings.index_refresh_interval,
            },
            "analysis": {
                "analyzer": analyzers::analyzers(),
                "normalizer": analyzers::normalizers(),
                "char_filter": analyzers::char_filters(),
            },
            "similarity": analyzers::similarity(),
        },
        "mappings": {
            "date_detection": false,
            "dynamic": false,
            "_source": { "excludes": source_excludes },
            "properties": properties,
        },
    })
}

fn static_properties(settings: &Settings, bucket: Bucket) -> Value {
    let date_format = date_format_pattern();

    let mut content = json!({
        "type": "text",
        "analyzer": "icu-default",
        "index_phrases": true,
    });
    if settings.content_term_vectors {
        content["term_vector"] = json!("with_positions_offsets");
    }
    if bucket == Bucket::Pages {
        content["store"] = json!(true);
    }

    let mut props = json!({
        "dataset": { "type": "keyword" },
        "collection_id": { "type": "long" },
        "schema": { "type": "keyword" },
        "schemata": { "type": "keyword" },
        "caption": { "type": "text", "analyzer": "icu-default" },

        "name": { "type": "text", "similarity": analyzers::WEAK_LENGTH_NORM, "store": true },
        "names": { "type": "keyword", "normalizer": "name-kw-normalizer" },
        "name_keys": { "type": "keyword" },
        "name_parts": { "type": "keyword" },
        "name_phonetic": { "type": "keyword" },
        "name_symbols": { "type": "keyword" },

        "content": content,
        "text": { "type": "text", "analyzer": "icu-default" },

        "geo_point": { "type": "geo_point" },
        "geohash": { "type": "keyword" },

        "created_at": { "type": "date", "format": date_format },
        "updated_at": { "type": "date", "format": date_format },
        "first_seen": { "type": "date", "format": date_format },
        "last_seen": { "type": "date", "format": date_format },
        "last_change": { "type": "date", "format": date_format },

        "num_values": { "type": "integer" },
        "referents": { "type": "keyword" },
        "origin": { "type": "keyword" },

        "index_bucket": { "type": "keyword" },
        "index_version": { "type": "keyword" },
        "indexed_at": { "type": "date" },
    });

    for group in GROUP_FIELDS {
        props[*group] = if *group == "dates" {
            json!({ "type": "date", "format": date_format })
        } else {
            json!({ "type": "keyword" })
        };
    }

    props
}

/// Resolves every property field definition (with `copy_to` wiring) and the
/// `numeric.*` duplicates, across every schema routed to `bucket`.
fn schema_property_fields(catalog: &dyn SchemaCatalog, bucket: Bucket) -> (Value, Value) {
    #[derive(Default)]
    struct Merged {
        types: BTreeSet<&'static str>,
        copy_to: BTreeSet<String>,
        numeric: bool,
    }

    let mut merged: BTreeMap<String, Merged> = BTreeMap::new();

    for name in catalog.names() {
        if search_types::bucket_for_schema(catalog, &name) != bucket {
            continue;
        }
        let Some(schema_def) = catalog.get(&name) else { continue };
        for (prop_name, descriptor) in &schema_def.properties {
            if prop_name == "name" {
                continue; // the name pipeline owns this field, not the generic property machinery
            }
            let entry = merged.entry(prop_name.clone()).or_default();
            let es_type = EsType::for_type_group(descriptor.type_group);
            entry.types.insert(match es_type {
                EsType::Text => "text",
                EsType::Date => "date",
                EsType::Keyword => "keyword",
            });
            entry.copy_to.insert(if descriptor.is_text() { "content".to_string() } else { "text".to_string() });
            if let Some(group) = descriptor.type_group.group_field() {
                entry.copy_to.insert(group.to_string());
            }
            if descriptor.is_numeric() {
                entry.numeric = true;
            }
        }
    }

    let date_format = date_format_pattern();
    let mut property_fields = serde_json::Map::new();
    let mut numeric_fields = serde_json::Map::new();

    for (prop_name, merged) in merged {
        // Keyword wins on type conflicts; a single type is used as-is.
        let resolved = if merged.types.contains("keyword") {
            "keyword"
        } else if merged.types.len() == 1 {
            merged.types.iter().next().copied().unwrap()
        } else {
            "keyword"
        };

        let mut field = match resolved {
            "text" => json!({ "type": "text", "analyzer": "icu-default" }),
            "date" => json!({ "type": "date", "format": date_format }),
            _ => json!({ "type": "keyword" }),
        };
        field["copy_to"] = json!(merged.copy_to.into_iter().collect::<Vec<_>>());
        property_fields.insert(prop_name.clone(), field);

        if merged.numeric {
            numeric_fields.insert(prop_name, json!({ "type": "double" }));
        }
    }

    (Value::Object(property_fields), Value::Object(numeric_fields))
}
