//! The FtM entity shape consumed for both search-time matching and
//! index-time document construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Context fields carried by an entity during ingestion; optional because a
/// freshly-matched entity built for a `MatchQuery` input rarely has them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityContext {
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub first_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub referents: Vec<String>,
    pub origin: Option<String>,
}

/// An FtM entity as handed to the search core, either as an ingestion
/// candidate or as the seed of a [`MatchQuery`](crate is search-core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub schema: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,
    pub dataset: String,
    #[serde(default)]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub context: EntityContext,
}

impl Entity {
    pub fn new(id: impl Into<String>, schema: impl Into<String>, dataset: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            schema: schema.into(),
            properties: BTreeMap::new(),
            dataset: dataset.into(),
            collection_id: None,
            context: EntityContext::default(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        self.properties
            .entry(name.into())
            .or_default()
            .extend(values);
        self
    }

    /// All values of the `name` property, the raw input to the name
    /// processor.
    pub fn names(&self) -> &[String] {
        self.properties
            .get("name")
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Total count of property values across every property, used for
    /// `num_values` and the `field_value_factor` scoring boost.
    pub fn num_values(&self) -> usize {
        self.properties.values().map(|v| v.len()).sum()
    }
}
