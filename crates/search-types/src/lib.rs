//! Data model and FtM schema adapter shared by the openaleph search core.
//!
//! This crate has no knowledge of Elasticsearch; it only describes the
//! entity shape and schema graph that the query and mapping builders in
//! `search-core` consume.

pub mod bucket;
pub mod entity;
pub mod schema;

pub use bucket::{bucket_for_schema, index_name, Bucket};
pub use entity::{Entity, EntityContext};
pub use schema::{InMemorySchemaCatalog, PropertyDescriptor, SchemaCatalog, SchemaDef, TypeGroup};
