//! Query construction, mapping generation and bulk ingestion for an
//! Elasticsearch-backed FollowTheMoney entity index.
//!
//! The crate has three layers: [`params`] turns a URL-style query grammar
//! into a typed view, [`query`] turns that view (or a candidate [`Entity`])
//! into an Elasticsearch request body, and [`mapping`]/[`document`] describe
//! how entities land in the index in the first place. [`executor`] and
//! [`bulk`] are the only places that touch I/O.

pub mod aggregations;
pub mod bulk;
pub mod clauses;
pub mod dates;
pub mod document;
pub mod error;
pub mod executor;
pub mod highlight;
pub mod mapping;
pub mod name;
pub mod params;
pub mod query;
pub mod settings;

pub use error::{Error, Result};
pub use search_types::{Bucket, Entity, EntityContext, SchemaCatalog, SchemaDef};
pub use settings::Settings;
