//! The authorization object threaded through query builders.
//!
//! The core never mutates or persists this: it is a per-request value the
//! embedder supplies, used only to scope dataset/collection access.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::clauses;

/// `{ is_admin, datasets, collection_ids }` from the external caller.
/// `None` sets mean "unrestricted" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub is_admin: bool,
    pub datasets: Option<BTreeSet<String>>,
    pub collection_ids: Option<BTreeSet<i64>>,
}

impl Auth {
    pub fn admin() -> Self {
        Auth { is_admin: true, datasets: None, collection_ids: None }
    }

    pub fn scoped_to_datasets(datasets: BTreeSet<String>) -> Self {
        Auth { is_admin: false, datasets: Some(datasets), collection_ids: None }
    }

    /// A `terms` filter clause restricting results to this auth's allowed
    /// datasets, or `None` when the caller is an admin or unrestricted.
    pub fn datasets_query(&self, field: &str) -> Option<Value> {
        if self.is_admin {
            return None;
        }
        let datasets: Vec<String> = self.datasets.as_ref()?.iter().cloned().collect();
        clauses::terms(field, &datasets)
    }
}
