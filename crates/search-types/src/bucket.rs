//! Schema -> bucket routing.
//!
//! Every indexed entity lands in one of four logical index partitions
//! ("buckets"), chosen from its schema. The bucket name feeds directly into
//! the physical index name pattern `{prefix}-entity-{bucket}-{version}`.

use std::fmt;

use crate::schema::SchemaCatalog;

/// The FtM schema names whose descendants define each non-default bucket.
/// `Things` is the fallback bucket for everything else.
pub const PAGES_ROOT: &str = "Page";
pub const DOCUMENTS_ROOT: &str = "Document";
pub const INTERVALS_ROOT: &str = "Interval";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Things,
    Intervals,
    Documents,
    Pages,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Things => "things",
            Bucket::Intervals => "intervals",
            Bucket::Documents => "documents",
            Bucket::Pages => "pages",
        }
    }

    pub const ALL: [Bucket; 4] = [Bucket::Things, Bucket::Intervals, Bucket::Documents, Bucket::Pages];

    /// The fraction of `settings.index_shards` this bucket's indices use.
    pub fn shard_fraction(self) -> f64 {
        match self {
            Bucket::Documents | Bucket::Pages => 1.0,
            Bucket::Things => 0.5,
            Bucket::Intervals => 1.0 / 3.0,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes a schema name to its bucket using the catalog's ancestor
/// relationships. Pages beat Documents beat Intervals beat the Things
/// default, since `Page` schemata are also `Document`s in FtM.
pub fn bucket_for_schema(catalog: &dyn SchemaCatalog, schema: &str) -> Bucket {
    if catalog.is_a(schema, PAGES_ROOT) {
        Bucket::Pages
    } else if catalog.is_a(schema, DOCUMENTS_ROOT) {
        Bucket::Documents
    } else if catalog.is_a(schema, INTERVALS_ROOT) {
        Bucket::Intervals
    } else {
        Bucket::Things
    }
}

/// Builds the physical index name for a bucket at a given index version.
pub fn index_name(prefix: &str, bucket: Bucket, version: &str) -> String {
    format!("{prefix}-entity-{bucket}-{version}", bucket = bucket.as_str())
}
