//! The FtM schema adapter.
//!
//! This module abstracts the FollowTheMoney schema catalog: lookups by name,
//! property descriptors, ancestor/descendant relationships and matchability.
//! All of it is pure data -- no I/O, no mutation after load.

use std::collections::{BTreeMap, BTreeSet};

/// The semantic group a property value belongs to. Determines which group
/// field (`countries`, `emails`, ...) the value is copied into at index time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeGroup {
    Name,
    Country,
    Language,
    Email,
    Phone,
    Date,
    Address,
    Identifier,
    Checksum,
    Ip,
    Url,
    Entity,
    Gender,
    Mimetype,
    Topic,
    Text,
    Html,
    Json,
    Number,
}

impl TypeGroup {
    /// The name of the group field this type group copies into, if any.
    /// `Text`/`Html`/`Json`/`Name` have no group field of their own: they flow
    /// into `content`/`text`/the name pipeline instead (see `is_text`).
    pub fn group_field(self) -> Option<&'static str> {
        match self {
            TypeGroup::Country => Some("countries"),
            TypeGroup::Language => Some("languages"),
            TypeGroup::Email => Some("emails"),
            TypeGroup::Phone => Some("phones"),
            TypeGroup::Date => Some("dates"),
            TypeGroup::Address => Some("addresses"),
            TypeGroup::Identifier => Some("identifiers"),
            TypeGroup::Checksum => Some("checksums"),
            TypeGroup::Ip => Some("ips"),
            TypeGroup::Url => Some("urls"),
            TypeGroup::Entity => Some("entities"),
            TypeGroup::Gender => Some("genders"),
            TypeGroup::Mimetype => Some("mimetypes"),
            TypeGroup::Topic => Some("topics"),
            TypeGroup::Name | TypeGroup::Text | TypeGroup::Html | TypeGroup::Json | TypeGroup::Number => None,
        }
    }

    /// Whether this type group is analyzed free text (as opposed to keyword).
    pub fn is_text(self) -> bool {
        matches!(self, TypeGroup::Text | TypeGroup::Html | TypeGroup::Json)
    }

    /// Whether this type group is duplicated into `numeric.<field>` for
    /// sorting and aggregation.
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeGroup::Number | TypeGroup::Date)
    }
}

/// A single property definition on a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub type_group: TypeGroup,
    pub is_matchable: bool,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, type_group: TypeGroup, is_matchable: bool) -> Self {
        PropertyDescriptor {
            name: name.into(),
            type_group,
            is_matchable,
        }
    }

    pub fn is_text(&self) -> bool {
        self.type_group.is_text()
    }

    pub fn is_numeric(&self) -> bool {
        self.type_group.is_numeric()
    }
}

/// A schema definition: its own properties plus everything inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDef {
    pub name: String,
    /// Ancestor schema names, including `name` itself.
    pub schemata: BTreeSet<String>,
    pub properties: BTreeMap<String, PropertyDescriptor>,
    pub matchable: bool,
    /// Schema names this schema is allowed to match against.
    pub matchable_schemata: BTreeSet<String>,
}

impl SchemaDef {
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.schemata.contains(ancestor)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }
}

/// Read-only access to the FtM schema catalog.
///
/// Implementors precompute ancestors, matchable sets and property-type maps
/// once at load time; lookups afterwards are plain map reads (see the
/// "Schema catalog with cyclic schema graph" redesign note).
pub trait SchemaCatalog: Send + Sync {
    fn get(&self, name: &str) -> Option<&SchemaDef>;

    fn is_a(&self, schema: &str, ancestor: &str) -> bool {
        self.get(schema).map(|s| s.is_a(ancestor)).unwrap_or(false)
    }

    fn matchable_schemata(&self, schema: &str) -> BTreeSet<String> {
        self.get(schema)
            .map(|s| s.matchable_schemata.clone())
            .unwrap_or_default()
    }

    /// All schema names known to the catalog.
    fn names(&self) -> Vec<String>;
}

/// A simple in-memory schema catalog, suitable for tests and for embedders
/// who want to precompute the FtM model into plain data ahead of time.
#[derive(Debug, Default, Clone)]
pub struct InMemorySchemaCatalog {
    schemata: BTreeMap<String, SchemaDef>,
}

impl InMemorySchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: SchemaDef) {
        self.schemata.insert(schema.name.clone(), schema);
    }

    pub fn builder() -> InMemorySchemaCatalogBuilder {
        InMemorySchemaCatalogBuilder::default()
    }
}

impl SchemaCatalog for InMemorySchemaCatalog {
    fn get(&self, name: &str) -> Option<&SchemaDef> {
        self.schemata.get(name)
    }

    fn names(&self) -> Vec<String> {
        self.schemata.keys().cloned().collect()
    }
}

/// Builds an [`InMemorySchemaCatalog`] from a flat list of (name, parents,
/// properties, matchable) tuples, resolving ancestor chains and matchable
/// peer sets transitively.
#[derive(Debug, Default)]
pub struct InMemorySchemaCatalogBuilder {
    raw: BTreeMap<String, RawSchema>,
}

#[derive(Debug, Clone, Default)]
struct RawSchema {
    parents: Vec<String>,
    properties: BTreeMap<String, PropertyDescriptor>,
    matchable: bool,
}

impl InMemorySchemaCatalogBuilder {
    pub fn schema(
        mut self,
        name: impl Into<String>,
        parents: &[&str],
        properties: Vec<PropertyDescriptor>,
        matchable: bool,
    ) -> Self {
        let name = name.into();
        let mut props = BTreeMap::new();
        for p in properties {
            props.insert(p.name.clone(), p);
        }
        self.raw.insert(
            name,
            RawSchema {
                parents: parents.iter().map(|s| s.to_string()).collect(),
                properties: props,
                matchable,
            },
        );
        self
    }

    fn ancestors(&self, name: &str, out: &mut BTreeSet<String>) {
        if !out.insert(name.to_string()) {
            return;
        }
        if let Some(raw) = self.raw.get(name) {
            for parent in &raw.parents {
                self.ancestors(parent, out);
            }
        }
    }

    fn all_properties(&self, name: &str, out: &mut BTreeMap<String, PropertyDescriptor>) {
        if let Some(raw) = self.raw.get(name) {
            for parent in &raw.parents {
                self.all_properties(parent, out);
            }
            for (k, v) in &raw.properties {
                out.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn build(self) -> InMemorySchemaCatalog {
        let matchable_names: BTreeSet<String> = self
            .raw
            .iter()
            .filter(|(_, r)| r.matchable)
            .map(|(n, _)| n.clone())
            .collect();

        let mut catalog = InMemorySchemaCatalog::new();
        for name in self.raw.keys() {
            let mut schemata = BTreeSet::new();
            self.ancestors(name, &mut schemata);

            let mut properties = BTreeMap::new();
            self.all_properties(name, &mut properties);

            let matchable = self.raw[name].matchable;
            // Matchable peers: every matchable schema that shares at least one
            // ancestor with this one (including itself).
            // "Thing" is the universal root and would make every matchable
            // schema a peer of every other; it is excluded from the overlap
            // test so peers must share a more specific ancestor.
            let specific_schemata: BTreeSet<&String> =
                schemata.iter().filter(|s| s.as_str() != "Thing").collect();

            let matchable_schemata = if matchable {
                matchable_names
                    .iter()
                    .filter(|other| {
                        let mut other_ancestors = BTreeSet::new();
                        self.ancestors(other, &mut other_ancestors);
                        let other_specific: BTreeSet<&String> = other_ancestors
                            .iter()
                            .filter(|s| s.as_str() != "Thing")
                            .collect();
                        specific_schemata
                            .iter()
                            .any(|s| other_specific.contains(s))
                    })
                    .cloned()
                    .collect()
            } else {
                BTreeSet::new()
            };

            catalog.insert(SchemaDef {
                name: name.clone(),
                schemata,
                properties,
                matchable,
                matchable_schemata,
            });
        }
        catalog
    }
}
