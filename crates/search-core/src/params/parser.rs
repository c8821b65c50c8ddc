//! Parses an ordered `(key, value)` pair list (the URL query string grammar
//! from the system boundary) into a typed [`ParsedParams`] view.
//!
//! Unknown keys are ignored; booleans accept `true`/`false`/`1`/`0`; bad
//! values for optional fields fall back silently rather than failing the
//! whole parse -- only the page-size invariant is enforced strictly (see
//! [`crate::Error::Param`]).

use std::collections::{BTreeMap, BTreeSet};

use crate::clauses::RangeOp;
use crate::params::auth::Auth;
use crate::settings::{parse_bool, Settings};
use crate::{Error, Result};

/// A sort key and its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Per-field facet configuration (`facet_size:<f>`, `facet_total:<f>`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSpec {
    pub field: String,
    pub size: Option<usize>,
    pub total: bool,
    pub values: Option<Vec<String>>,
    pub facet_type: Option<String>,
    pub interval: Option<String>,
}

impl FacetSpec {
    fn new(field: impl Into<String>) -> Self {
        FacetSpec { field: field.into(), ..Default::default() }
    }
}

/// `facet_significant_text` configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificantTextSpec {
    pub field: String,
    pub size: Option<usize>,
    pub min_doc_count: Option<u64>,
    pub shard_size: Option<u32>,
}

/// MLT knobs, carried as raw strings/numbers until the `MoreLikeThisQuery`
/// builder consumes them -- `minimum_should_match` can be a percentage
/// string ("20%") or a plain count, which ES accepts either way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MltParams {
    pub min_doc_freq: Option<u32>,
    pub min_term_freq: Option<u32>,
    pub max_query_terms: Option<u32>,
    pub minimum_should_match: Option<String>,
}

/// The fully-parsed, typed view of a query request.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedParams {
    pub q: Option<String>,
    pub prefix: Option<String>,

    pub offset: usize,
    pub limit: usize,
    pub next_limit: usize,

    pub sort: Vec<(String, SortDir)>,

    pub filters: BTreeMap<String, Vec<String>>,
    pub exclusions: BTreeMap<String, Vec<String>>,
    pub empties: BTreeSet<String>,
    pub ranges: Vec<(String, RangeOp, String)>,

    pub facets: Vec<FacetSpec>,
    pub significant_terms: Vec<FacetSpec>,
    pub significant_text: Option<SignificantTextSpec>,

    pub highlight: bool,
    pub highlight_count: u32,
    pub max_highlight_analyzed_offset: Option<u32>,

    pub mlt: MltParams,

    pub dehydrate: bool,

    /// Datasets in scope after merging the caller's filters with `auth`'s
    /// allowed set (intersected, never rejected -- see `Error::AuthRequired`
    /// for the one case that *is* rejected).
    pub effective_datasets: Vec<String>,
    pub effective_collection_ids: Vec<i64>,
    /// A routing hint, set only when the effective scope is a single small
    /// enough set of datasets/collections to route by.
    pub routing_key: Option<String>,
}

impl ParsedParams {
    pub fn page(&self) -> usize {
        if self.limit == 0 {
            0
        } else {
            self.offset / self.limit
        }
    }
}

/// Caps the number of distinct datasets/collections a routing key may cover;
/// beyond this the query is issued without a `routing` hint.
const ROUTING_MAX_SCOPE: usize = 8;

pub fn parse(pairs: &[(String, String)], settings: &Settings, auth: Option<&Auth>) -> Result<ParsedParams> {
    if settings.search_auth && auth.is_none() {
        return Err(Error::AuthRequired);
    }

    let mut q = None;
    let mut prefix = None;
    let mut offset = 0usize;
    let mut limit = 20usize;
    let mut limit_set = false;
    let mut next_limit = None;
    let mut sort = Vec::new();
    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut exclusions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut empties = BTreeSet::new();
    let mut ranges = Vec::new();
    let mut facet_fields: Vec<String> = Vec::new();
    let mut facet_specs: BTreeMap<String, FacetSpec> = BTreeMap::new();
    let mut sig_fields: Vec<String> = Vec::new();
    let mut sig_specs: BTreeMap<String, FacetSpec> = BTreeMap::new();
    let mut sig_text_field: Option<String> = None;
    let mut sig_text_size = None;
    let mut sig_text_min_doc_count = None;
    let mut sig_text_shard_size = None;
    let mut highlight = false;
    let mut highlight_count = 3u32;
    let mut max_highlight_analyzed_offset = None;
    let mut mlt = MltParams::default();
    let mut dehydrate = false;

    for (key, value) in pairs {
        if let Some(field) = key.strip_prefix("filter:") {
            if let Some((op, field)) = parse_range_prefix(field) {
                ranges.push((field.to_string(), op, value.clone()));
            } else {
                filters.entry(field.to_string()).or_default().push(value.clone());
            }
            continue;
        }
        if let Some(field) = key.strip_prefix("exclude:") {
            exclusions.entry(field.to_string()).or_default().push(value.clone());
            continue;
        }
        if let Some(field) = key.strip_prefix("empty:") {
            if parse_bool(value) == Some(true) {
                empties.insert(field.to_string());
            }
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_significant_size:") {
            sig_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).size = value.parse().ok();
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_significant_total:") {
            sig_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).total =
                parse_bool(value).unwrap_or(false);
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_significant_values:") {
            sig_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).values = Some(split_csv(value));
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_significant_type:") {
            sig_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).facet_type = Some(value.clone());
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_size:") {
            facet_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).size = value.parse().ok();
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_total:") {
            facet_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).total =
                parse_bool(value).unwrap_or(false);
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_values:") {
            facet_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).values = Some(split_csv(value));
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_type:") {
            facet_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).facet_type = Some(value.clone());
            continue;
        }
        if let Some(field) = key.strip_prefix("facet_interval:") {
            facet_specs.entry(field.to_string()).or_insert_with(|| FacetSpec::new(field)).interval = Some(value.clone());
            continue;
        }

        match key.as_str() {
            "q" => q = Some(value.clone()),
            "prefix" => prefix = Some(value.clone()),
            "offset" => offset = value.parse().unwrap_or(0),
            "limit" => {
                limit = value.parse().unwrap_or(20);
                limit_set = true;
            }
            "next_limit" => next_limit = value.parse().ok(),
            "sort" => {
                for entry in value.split(',') {
                    let entry = entry.trim();
                    if entry.is_empty() {
                        continue;
                    }
                    match entry.split_once(':') {
                        Some((field, "desc")) => sort.push((field.to_string(), SortDir::Desc)),
                        Some((field, "asc")) => sort.push((field.to_string(), SortDir::Asc)),
                        Some((field, _)) => sort.push((field.to_string(), SortDir::Asc)),
                        None => sort.push((entry.to_string(), SortDir::Asc)),
                    }
                }
            }
            "facet" => facet_fields.push(value.clone()),
            "facet_significant" => sig_fields.push(value.clone()),
            "facet_significant_text" => sig_text_field = Some(value.clone()),
            "facet_significant_text_size" => sig_text_size = value.parse().ok(),
            "facet_significant_text_min_doc_count" => sig_text_min_doc_count = value.parse().ok(),
            "facet_significant_text_shard_size" => sig_text_shard_size = value.parse().ok(),
            "highlight" => highlight = parse_bool(value).unwrap_or(false),
            "highlight_count" => highlight_count = value.parse().unwrap_or(3),
            "max_highlight_analyzed_offset" => max_highlight_analyzed_offset = value.parse().ok(),
            "mlt_min_doc_freq" => mlt.min_doc_freq = value.parse().ok(),
            "mlt_min_term_freq" => mlt.min_term_freq = value.parse().ok(),
            "mlt_max_query_terms" => mlt.max_query_terms = value.parse().ok(),
            "mlt_minimum_should_match" => mlt.minimum_should_match = Some(value.clone()),
            "dehydrate" => dehydrate = parse_bool(value).unwrap_or(false),
            _ => {} // unknown keys ignored
        }
    }

    if !limit_set {
        limit = 20;
    }
    if offset.saturating_add(limit) > crate::settings::MAX_PAGE {
        return Err(Error::Param {
            field: "limit".to_string(),
            message: format!("offset+limit exceeds MAX_PAGE={}", crate::settings::MAX_PAGE),
        });
    }
    let next_limit = next_limit.unwrap_or(limit);

    let facets: Vec<FacetSpec> = facet_fields
        .into_iter()
        .map(|field| facet_specs.remove(&field).unwrap_or_else(|| FacetSpec::new(&field)))
        .collect();
    let significant_terms: Vec<FacetSpec> = sig_fields
        .into_iter()
        .map(|field| sig_specs.remove(&field).unwrap_or_else(|| FacetSpec::new(&field)))
        .collect();
    let significant_text = sig_text_field.map(|field| SignificantTextSpec {
        field,
        size: sig_text_size,
        min_doc_count: sig_text_min_doc_count,
        shard_size: sig_text_shard_size,
    });

    let auth_field = settings.search_auth_field.as_str();
    let user_datasets = filters.get(auth_field).cloned().unwrap_or_default();
    let user_collection_ids: Vec<i64> = filters
        .get("collection_id")
        .map(|v| v.iter().filter_map(|s| s.parse().ok()).collect())
        .unwrap_or_default();

    let (effective_datasets, effective_collection_ids) = match auth {
        None => (user_datasets, user_collection_ids),
        Some(a) if a.is_admin => (user_datasets, user_collection_ids),
        Some(a) => {
            let datasets = match &a.datasets {
                Some(allowed) => intersect_or_default(&user_datasets, allowed),
                None => user_datasets,
            };
            let collection_ids = match &a.collection_ids {
                Some(allowed) => user_collection_ids.into_iter().filter(|c| allowed.contains(c)).collect(),
                None => user_collection_ids,
            };
            (datasets, collection_ids)
        }
    };

    let routing_key = compute_routing_key(&effective_datasets, &effective_collection_ids);

    Ok(ParsedParams {
        q,
        prefix,
        offset,
        limit,
        next_limit,
        sort,
        filters,
        exclusions,
        empties,
        ranges,
        facets,
        significant_terms,
        significant_text,
        highlight,
        highlight_count,
        max_highlight_analyzed_offset,
        mlt,
        dehydrate,
        effective_datasets,
        effective_collection_ids,
        routing_key,
    })
}

fn intersect_or_default(requested: &[String], allowed: &BTreeSet<String>) -> Vec<String> {
    if requested.is_empty() {
        allowed.iter().cloned().collect()
    } else {
        requested.iter().filter(|d| allowed.contains(*d)).cloned().collect()
    }
}

fn compute_routing_key(datasets: &[String], collection_ids: &[i64]) -> Option<String> {
    if !collection_ids.is_empty() && collection_ids.len() <= ROUTING_MAX_SCOPE {
        let mut ids = collection_ids.to_vec();
        ids.sort_unstable();
        return Some(ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(","));
    }
    if !datasets.is_empty() && datasets.len() <= ROUTING_MAX_SCOPE {
        let mut ds = datasets.to_vec();
        ds.sort();
        return Some(ds.join(","));
    }
    None
}

fn parse_range_prefix(field: &str) -> Option<(RangeOp, &str)> {
    for (prefix, op) in [("gte:", RangeOp::Gte), ("gt:", RangeOp::Gt), ("lte:", RangeOp::Lte), ("lt:", RangeOp::Lt)] {
        if let Some(rest) = field.strip_prefix(prefix) {
            return Some((op, rest));
        }
    }
    None
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}
