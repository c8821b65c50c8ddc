//! Process-wide configuration, loaded once by the embedder and threaded
//! through builder constructors (never a global singleton -- see the
//! "Global settings singleton" redesign note).

use std::collections::HashMap;
use std::time::Duration;

pub const ENV_PREFIX: &str = "OPENALEPH_SEARCH_";
pub const MAX_PAGE: usize = 9999;
pub const MAX_CLAUSES: usize = 500;

/// Field names considered cheap enough to always allow full facet size and
/// totals for, even for unauthenticated callers.
pub const SMALL_FACETS: &[&str] = &["schema", "schemata", "dataset", "countries", "languages"];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub uri: String,
    pub timeout: Duration,
    pub max_retries: u32,

    pub indexer_concurrency: usize,
    pub indexer_chunk_size: usize,
    pub indexer_max_chunk_bytes: usize,

    pub index_prefix: String,
    pub index_write: String,
    pub index_read: Vec<String>,
    pub index_shards: u32,
    pub index_replicas: u32,
    pub index_namespace_ids: bool,
    pub index_refresh_interval: String,
    pub index_boost_intervals: f64,
    pub index_boost_things: f64,
    pub index_boost_documents: f64,
    pub index_boost_pages: f64,

    pub content_term_vectors: bool,
    pub query_function_score: bool,

    pub highlighter_fvh_enabled: bool,
    pub highlight_fragment_size: u32,
    pub highlight_number_of_fragments: u32,
    pub highlight_phrase_limit: u32,
    pub highlight_boundary_max_scan: u32,
    pub highlight_no_match_size: u32,
    pub highlight_max_analyzed_offset: u32,

    pub search_auth: bool,
    pub search_auth_field: String,

    pub facet_default_size: usize,
    pub facet_unauthenticated_max_size: usize,

    pub min_doc_count: u64,
    pub shard_min_doc_count: u64,
    pub significant_terms_sampler_size: u32,
    pub significant_terms_random_sampler: bool,
    pub significant_terms_random_sampler_target: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            uri: "http://localhost:9200".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,

            indexer_concurrency: 8,
            indexer_chunk_size: 1000,
            indexer_max_chunk_bytes: 5 * 1024 * 1024,

            index_prefix: "openaleph".to_string(),
            index_write: "v1".to_string(),
            index_read: vec!["v1".to_string()],
            index_shards: 10,
            index_replicas: 0,
            index_namespace_ids: true,
            index_refresh_interval: "1s".to_string(),
            index_boost_intervals: 1.0,
            index_boost_things: 1.0,
            index_boost_documents: 1.0,
            index_boost_pages: 1.0,

            content_term_vectors: true,
            query_function_score: true,

            highlighter_fvh_enabled: true,
            highlight_fragment_size: 200,
            highlight_number_of_fragments: 3,
            highlight_phrase_limit: 64,
            highlight_boundary_max_scan: 100,
            highlight_no_match_size: 300,
            highlight_max_analyzed_offset: 999_999,

            search_auth: false,
            search_auth_field: "dataset".to_string(),

            facet_default_size: 20,
            facet_unauthenticated_max_size: 50,

            min_doc_count: 3,
            shard_min_doc_count: 1,
            significant_terms_sampler_size: 1000,
            significant_terms_random_sampler: false,
            significant_terms_random_sampler_target: 10_000,
        }
    }
}

impl Settings {
    /// Loads settings from `OPENALEPH_SEARCH_*` environment variables,
    /// falling back to the documented default for anything unset or
    /// unparsable. A bad value is never fatal: it is logged and the default
    /// is kept, matching the parser's "ignore and default" posture.
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX).map(|stripped| (stripped.to_string(), v))
            })
            .collect();
        Self::from_pairs(vars)
    }

    /// Test/embedder entry point: build settings from an explicit map of
    /// `OPENALEPH_SEARCH_`-stripped keys, without touching process
    /// environment.
    pub fn from_pairs(vars: HashMap<String, String>) -> Self {
        let mut settings = Settings::default();

        macro_rules! set_str {
            ($key:literal, $field:ident) => {
                if let Some(v) = vars.get($key) {
                    settings.$field = v.clone();
                }
            };
        }
        macro_rules! set_parsed {
            ($key:literal, $field:ident) => {
                if let Some(v) = vars.get($key) {
                    match v.parse() {
                        Ok(parsed) => settings.$field = parsed,
                        Err(_) => tracing::warn!(key = $key, value = %v, "ignoring unparsable setting, using default"),
                    }
                }
            };
        }
        macro_rules! set_bool {
            ($key:literal, $field:ident) => {
                if let Some(v) = vars.get($key) {
                    match parse_bool(v) {
                        Some(parsed) => settings.$field = parsed,
                        None => tracing::warn!(key = $key, value = %v, "ignoring unparsable boolean setting, using default"),
                    }
                }
            };
        }

        set_str!("URI", uri);
        if let Some(v) = vars.get("TIMEOUT") {
            if let Ok(secs) = v.parse::<u64>() {
                settings.timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!(key = "TIMEOUT", value = %v, "ignoring unparsable setting, using default");
            }
        }
        set_parsed!("MAX_RETRIES", max_retries);

        set_parsed!("INDEXER_CONCURRENCY", indexer_concurrency);
        set_parsed!("INDEXER_CHUNK_SIZE", indexer_chunk_size);
        set_parsed!("INDEXER_MAX_CHUNK_BYTES", indexer_max_chunk_bytes);

        set_str!("INDEX_PREFIX", index_prefix);
        set_str!("INDEX_WRITE", index_write);
        if let Some(v) = vars.get("INDEX_READ") {
            settings.index_read = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        set_parsed!("INDEX_SHARDS", index_shards);
        set_parsed!("INDEX_REPLICAS", index_replicas);
        set_bool!("INDEX_NAMESPACE_IDS", index_namespace_ids);
        set_str!("INDEX_REFRESH_INTERVAL", index_refresh_interval);
        set_parsed!("INDEX_BOOST_INTERVALS", index_boost_intervals);
        set_parsed!("INDEX_BOOST_THINGS", index_boost_things);
        set_parsed!("INDEX_BOOST_DOCUMENTS", index_boost_documents);
        set_parsed!("INDEX_BOOST_PAGES", index_boost_pages);

        set_bool!("CONTENT_TERM_VECTORS", content_term_vectors);
        set_bool!("QUERY_FUNCTION_SCORE", query_function_score);

        set_bool!("HIGHLIGHTER_FVH_ENABLED", highlighter_fvh_enabled);
        set_parsed!("HIGHLIGHT_FRAGMENT_SIZE", highlight_fragment_size);
        set_parsed!("HIGHLIGHT_NUMBER_OF_FRAGMENTS", highlight_number_of_fragments);
        set_parsed!("HIGHLIGHT_PHRASE_LIMIT", highlight_phrase_limit);
        set_parsed!("HIGHLIGHT_BOUNDARY_MAX_SCAN", highlight_boundary_max_scan);
        set_parsed!("HIGHLIGHT_NO_MATCH_SIZE", highlight_no_match_size);
        set_parsed!("HIGHLIGHT_MAX_ANALYZED_OFFSET", highlight_max_analyzed_offset);

        set_bool!("SEARCH_AUTH", search_auth);
        set_str!("SEARCH_AUTH_FIELD", search_auth_field);

        set_parsed!("FACET_DEFAULT_SIZE", facet_default_size);
        set_parsed!("FACET_UNAUTHENTICATED_MAX_SIZE", facet_unauthenticated_max_size);

        set_parsed!("MIN_DOC_COUNT", min_doc_count);
        set_parsed!("SHARD_MIN_DOC_COUNT", shard_min_doc_count);
        set_parsed!("SIGNIFICANT_TERMS_SAMPLER_SIZE", significant_terms_sampler_size);
        set_bool!("SIGNIFICANT_TERMS_RANDOM_SAMPLER", significant_terms_random_sampler);
        set_parsed!(
            "SIGNIFICANT_TERMS_RANDOM_SAMPLER_TARGET",
            significant_terms_random_sampler_target
        );

        settings
    }

    /// Clamps a (possibly user-requested) facet size for `field` given
    /// whether the caller is authenticated. Unauthenticated callers are
    /// capped at `facet_unauthenticated_max_size` for every field outside
    /// `SMALL_FACETS`.
    pub fn clamp_facet_size(&self, field: &str, requested: usize, authenticated: bool) -> usize {
        if !authenticated && !SMALL_FACETS.contains(&field) {
            requested.min(self.facet_unauthenticated_max_size)
        } else {
            requested
        }
    }

    /// Whether `facet_total` (a sibling `cardinality` aggregation) is
    /// permitted for `field` given the caller's authentication state.
    pub fn totals_allowed(&self, field: &str, authenticated: bool) -> bool {
        authenticated || SMALL_FACETS.contains(&field)
    }

    pub fn index_boost(&self, bucket: search_types::Bucket) -> f64 {
        match bucket {
            search_types::Bucket::Intervals => self.index_boost_intervals,
            search_types::Bucket::Things => self.index_boost_things,
            search_types::Bucket::Documents => self.index_boost_documents,
            search_types::Bucket::Pages => self.index_boost_pages,
        }
    }
}

pub(crate) fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.index_prefix, "openaleph");
        assert_eq!(s.index_write, "v1");
        assert_eq!(s.index_read, vec!["v1".to_string()]);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.indexer_concurrency, 8);
        assert_eq!(s.indexer_chunk_size, 1000);
        assert_eq!(s.facet_default_size, 20);
        assert_eq!(s.facet_unauthenticated_max_size, 50);
    }

    #[test]
    fn bad_values_fall_back_to_default() {
        let mut vars = HashMap::new();
        vars.insert("MAX_RETRIES".to_string(), "not-a-number".to_string());
        vars.insert("INDEX_SHARDS".to_string(), "12".to_string());
        let s = Settings::from_pairs(vars);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.index_shards, 12);
    }

    #[test]
    fn facet_size_caps_unauthenticated_callers() {
        let s = Settings::default();
        assert_eq!(s.clamp_facet_size("dataset", 500, false), 500);
        assert_eq!(s.clamp_facet_size("some_other_field", 500, false), 50);
        assert_eq!(s.clamp_facet_size("some_other_field", 500, true), 500);
        assert!(!s.totals_allowed("some_other_field", false));
        assert!(s.totals_allowed("dataset", false));
    }

    #[test]
    fn index_read_list_splits_on_comma() {
        let mut vars = HashMap::new();
        vars.insert("INDEX_READ".to_string(), "v1, v2,v3".to_string());
        let s = Settings::from_pairs(vars);
        assert_eq!(s.index_read, vec!["v1", "v2", "v3"]);
    }
}
