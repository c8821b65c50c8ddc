//! Builds an [`IndexedDocument`] from an [`Entity`] plus its schema
//! definition -- the index-time counterpart of the query-time name pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use search_types::{Bucket, Entity, SchemaCatalog, TypeGroup};

use crate::dates::parse_flexible_date;
use crate::name::NameProcessor;
use crate::{Error, Result};

/// The document shape actually sent to Elasticsearch for one entity.
///
/// `properties` and `numeric` are nested objects (`properties.<name>`,
/// `numeric.<field>` in the mapping) rather than flattened dotted keys,
/// which is how the mapping builder in [`crate::mapping`] declares them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexedDocument {
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    pub schema: String,
    pub schemata: Vec<String>,
    pub caption: String,

    pub name: Vec<String>,
    pub names: Vec<String>,
    pub name_keys: Vec<String>,
    pub name_parts: Vec<String>,
    pub name_phonetic: Vec<String>,
    pub name_symbols: Vec<String>,

    pub content: String,
    pub text: String,

    pub countries: Vec<String>,
    pub languages: Vec<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub dates: Vec<String>,
    pub addresses: Vec<String>,
    pub ips: Vec<String>,
    pub urls: Vec<String>,
    pub identifiers: Vec<String>,
    pub checksums: Vec<String>,
    pub entities: Vec<String>,
    pub genders: Vec<String>,
    pub mimetypes: Vec<String>,
    pub topics: Vec<String>,

    pub properties: BTreeMap<String, Vec<String>>,
    pub numeric: BTreeMap<String, f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geohash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<DateTime<Utc>>,

    pub num_values: usize,
    pub referents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    pub index_bucket: String,
    pub index_version: String,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedDocument {
    /// The ES bulk action line pair: `{"index": {"_index":..,"_id":..}}`
    /// followed by the document body, per the bulk ingestion contract.
    pub fn bulk_action(&self, index: &str, id: &str) -> (Value, Value) {
        (
            serde_json::json!({ "index": { "_index": index, "_id": id } }),
            serde_json::to_value(self).expect("IndexedDocument always serializes"),
        )
    }
}

fn group_field_mut<'a>(doc: &'a mut IndexedDocument, group: &str) -> Option<&'a mut Vec<String>> {
    Some(match group {
        "countries" => &mut doc.countries,
        "languages" => &mut doc.languages,
        "emails" => &mut doc.emails,
        "phones" => &mut doc.phones,
        "dates" => &mut doc.dates,
        "addresses" => &mut doc.addresses,
        "ips" => &mut doc.ips,
        "urls" => &mut doc.urls,
        "identifiers" => &mut doc.identifiers,
        "checksums" => &mut doc.checksums,
        "entities" => &mut doc.entities,
        "genders" => &mut doc.genders,
        "mimetypes" => &mut doc.mimetypes,
        "topics" => &mut doc.topics,
        _ => return None,
    })
}

/// Builds the indexed document for `entity`. `indexed_at` is supplied by the
/// caller rather than read from the system clock, keeping this function pure.
pub fn build_document(
    entity: &Entity,
    catalog: &dyn SchemaCatalog,
    processor: &NameProcessor,
    bucket: Bucket,
    index_version: &str,
    indexed_at: DateTime<Utc>,
) -> Result<IndexedDocument> {
    let schema_def = catalog.get(&entity.schema).ok_or_else(|| Error::Schema { schema: entity.schema.clone() })?;

    let names = processor.represent(&entity.schema, entity.names());
    let caption = names
        .names
        .iter()
        .next()
        .cloned()
        .unwrap_or_else(|| entity.schema.clone());

    let mut doc = IndexedDocument {
        dataset: entity.dataset.clone(),
        collection_id: entity.collection_id,
        schema: entity.schema.clone(),
        schemata: schema_def.schemata.iter().cloned().collect(),
        caption,

        name: entity.names().to_vec(),
        names: names.names.into_iter().collect(),
        name_keys: names.name_keys.into_iter().collect(),
        name_parts: names.name_parts.into_iter().collect(),
        name_phonetic: names.name_phonetic.into_iter().collect(),
        name_symbols: names.name_symbols.into_iter().collect(),

        content: String::new(),
        text: String::new(),

        countries: Vec::new(),
        languages: Vec::new(),
        emails: Vec::new(),
        phones: Vec::new(),
        dates: Vec::new(),
        addresses: Vec::new(),
        ips: Vec::new(),
        urls: Vec::new(),
        identifiers: Vec::new(),
        checksums: Vec::new(),
        entities: Vec::new(),
        genders: Vec::new(),
        mimetypes: Vec::new(),
        topics: Vec::new(),

        properties: BTreeMap::new(),
        numeric: BTreeMap::new(),

        geo_point: None,
        geohash: None,

        created_at: entity.context.created_at,
        updated_at: entity.context.updated_at,
        first_seen: entity.context.first_seen,
        last_seen: entity.context.last_seen,
        last_change: entity.context.updated_at.or(entity.context.last_seen),

        num_values: entity.num_values(),
        referents: entity.context.referents.clone(),
        origin: entity.context.origin.clone(),

        index_bucket: bucket.as_str().to_string(),
        index_version: index_version.to_string(),
        indexed_at,
    };

    let mut content_parts: Vec<&str> = Vec::new();
    let mut text_parts: Vec<&str> = Vec::new();

    for (prop_name, values) in &entity.properties {
        if prop_name == "name" {
            continue; // the name pipeline owns this field, not the generic property machinery
        }
        let Some(descriptor) = schema_def.property(prop_name) else {
            tracing::warn!(schema = %entity.schema, property = %prop_name, "skipping unknown property");
            continue;
        };

        doc.properties.insert(prop_name.clone(), values.clone());

        if descriptor.is_text() {
            content_parts.extend(values.iter().map(|s| s.as_str()));
        } else {
            text_parts.extend(values.iter().map(|s| s.as_str()));
        }

        if let Some(group) = descriptor.type_group.group_field() {
            if let Some(field) = group_field_mut(&mut doc, group) {
                field.extend(values.iter().cloned());
            }
        }

        if descriptor.is_numeric() {
            for value in values {
                let parsed = match descriptor.type_group {
                    TypeGroup::Date => parse_flexible_date(value).map(|d| d.timestamp() as f64),
                    _ => value.parse::<f64>().ok(),
                };
                if let Some(n) = parsed {
                    doc.numeric.insert(prop_name.clone(), n);
                }
            }
        }
    }

    doc.content = content_parts.join(" ");
    doc.text = text_parts.join(" ");

    apply_geo(entity, &mut doc);

    Ok(doc)
}

/// Populates `geo_point`/`geohash` from `latitude`/`longitude` properties
/// when present; most schemata carry neither.
fn apply_geo(entity: &Entity, doc: &mut IndexedDocument) {
    let lat = entity.properties.get("latitude").and_then(|v| v.first()).and_then(|s| s.parse::<f64>().ok());
    let lon = entity.properties.get("longitude").and_then(|v| v.first()).and_then(|s| s.parse::<f64>().ok());

    if let (Some(lat), Some(lon)) = (lat, lon) {
        let point = geo::Point::new(lon, lat);
        if let Ok(hash) = geohash::encode(geo::coord! { x: point.x(), y: point.y() }, 9) {
            doc.geohash = Some(hash);
        }
        doc.geo_point = Some(format!("{lat},{lon}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::{NameProcessor, StaticNameSymbolDictionary};
    use search_types::{InMemorySchemaCatalog, PropertyDescriptor};

    fn catalog() -> InMemorySchemaCatalog {
        InMemorySchemaCatalog::builder()
            .schema("Thing", &[], vec![], false)
            .schema(
                "LegalEntity",
                &["Thing"],
                vec![
                    PropertyDescriptor::new("name", TypeGroup::Name, true),
                    PropertyDescriptor::new("country", TypeGroup::Country, true),
                    PropertyDescriptor::new("notes", TypeGroup::Text, false),
                ],
                true,
            )
            .schema(
                "Person",
                &["LegalEntity"],
                vec![PropertyDescriptor::new("birthDate", TypeGroup::Date, true)],
                true,
            )
            .build()
    }

    #[test]
    fn builds_document_with_group_and_numeric_fields() {
        let catalog = catalog();
        let dict = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dict);

        let entity = Entity::new("e1", "Person", "ds")
            .with_property("name", ["Vladimir Putin".to_string()])
            .with_property("country", ["ru".to_string()])
            .with_property("birthDate", ["1952-10-07".to_string()])
            .with_property("notes", ["some free text".to_string()]);

        let indexed_at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let doc = build_document(&entity, &catalog, &processor, Bucket::Things, "v1", indexed_at).unwrap();

        assert_eq!(doc.schemata, vec!["LegalEntity", "Person", "Thing"]);
        assert!(doc.countries.contains(&"ru".to_string()));
        assert!(doc.numeric.contains_key("birthDate"));
        assert_eq!(doc.content, "some free text");
        assert!(doc.text.contains("ru"));
        assert_eq!(doc.num_values, 4);
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let catalog = catalog();
        let dict = StaticNameSymbolDictionary::new();
        let processor = NameProcessor::new(&catalog, &dict);
        let entity = Entity::new("e1", "Nope", "ds");
        let indexed_at = Utc::now();
        assert!(build_document(&entity, &catalog, &processor, Bucket::Things, "v1", indexed_at).is_err());
    }
}
