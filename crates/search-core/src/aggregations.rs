//! Facet, significant-terms and significant-text aggregation builders, with
//! post-filter isolation and background-filter scoping.

use serde_json::{json, Value};

use crate::dates::date_format_pattern;
use crate::params::FacetSpec;
use crate::params::SignificantTextSpec;
use crate::settings::Settings;

/// Builds one regular facet's aggregation, isolated from its own filter.
///
/// `isolated_filter` must already exclude any filter on `field` (see the
/// "post-filter isolation" invariant); this function only shapes the terms
/// or date-histogram aggregation nested under it.
pub fn build_facet_aggregation(
    field: &str,
    spec: &FacetSpec,
    isolated_filter: Value,
    settings: &Settings,
    authenticated: bool,
    is_date_field: bool,
    date_bounds: Option<(String, String)>,
) -> (String, Value) {
    let requested_size = spec.size.unwrap_or(settings.facet_default_size);
    let size = settings.clamp_facet_size(field, requested_size, authenticated);

    let mut inner = serde_json::Map::new();

    if is_date_field {
        if let Some(interval) = &spec.interval {
            let interval_key = if is_calendar_interval(interval) { "calendar_interval" } else { "fixed_interval" };
            let mut histogram = json!({
                "date_histogram": {
                    "field": field,
                    interval_key: interval,
                    "min_doc_count": 0,
                    "format": date_format_pattern(),
                }
            });
            if let Some((min, max)) = date_bounds {
                histogram["date_histogram"]["extended_bounds"] = json!({ "min": min, "max": max });
            }
            inner.insert(field.to_string(), histogram);
            return (field.to_string(), json!({ "filter": isolated_filter, "aggs": inner }));
        }
    }

    inner.insert(field.to_string(), json!({ "terms": { "field": field, "size": size, "execution_hint": "map" } }));
    if spec.total && settings.totals_allowed(field, authenticated) {
        inner.insert(format!("{field}_total"), json!({ "cardinality": { "field": field } }));
    }

    (field.to_string(), json!({ "filter": isolated_filter, "aggs": inner }))
}

/// Calendar units and their single-multiple shorthand accept `calendar_interval`
/// (`"month"`, `"1M"`, ...); any other multiple (`"30m"`, `"6h"`, `"2w"`, ...)
/// needs `fixed_interval` since ES's calendar intervals don't accept
/// arbitrary multiples of a unit.
fn is_calendar_interval(interval: &str) -> bool {
    const CALENDAR_WORDS: &[&str] = &["second", "minute", "hour", "day", "week", "month", "quarter", "year"];
    if CALENDAR_WORDS.contains(&interval) {
        return true;
    }
    matches!(interval.strip_prefix('1'), Some("s" | "m" | "h" | "d" | "w" | "M" | "q" | "y"))
}

/// Which sampler wraps a significant-terms/text aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerKind {
    Diversified,
    Plain,
    Random { probability: f64 },
}

/// Chooses the sampler per the scoping rule: a diversified sampler when no
/// dataset/collection scope narrows the query already, a plain sampler
/// otherwise; a random sampler instead of either when the setting is on.
pub fn choose_sampler_kind(scope_present: bool, settings: &Settings, foreground_count: Option<u64>) -> SamplerKind {
    if settings.significant_terms_random_sampler {
        let probability = match foreground_count {
            Some(count) if count > 0 => {
                (settings.significant_terms_random_sampler_target as f64 / count as f64).min(1.0)
            }
            _ => 1.0,
        };
        SamplerKind::Random { probability }
    } else if scope_present {
        SamplerKind::Plain
    } else {
        SamplerKind::Diversified
    }
}

fn wrap_sampler(kind: SamplerKind, settings: &Settings, auth_field: &str, inner_aggs: Value) -> Value {
    match kind {
        SamplerKind::Diversified => json!({
            "diversified_sampler": { "shard_size": settings.significant_terms_sampler_size, "field": auth_field },
            "aggs": inner_aggs,
        }),
        SamplerKind::Plain => json!({
            "sampler": { "shard_size": settings.significant_terms_sampler_size },
            "aggs": inner_aggs,
        }),
        SamplerKind::Random { probability } => json!({
            "random_sampler": { "probability": probability },
            "aggs": inner_aggs,
        }),
    }
}

pub fn build_significant_terms_aggregation(
    field: &str,
    spec: &FacetSpec,
    background_filter: Option<Value>,
    sampler_kind: SamplerKind,
    settings: &Settings,
    auth_field: &str,
) -> (String, Value) {
    let size = spec.size.unwrap_or(settings.facet_default_size) as u64;
    let shard_size = (size * 5).max(100);

    let mut sig = json!({
        "significant_terms": {
            "field": field,
            "size": size,
            "min_doc_count": settings.min_doc_count,
            "shard_min_doc_count": settings.shard_min_doc_count,
            "shard_size": shard_size,
            "execution_hint": "map",
        }
    });
    if let Some(bf) = background_filter {
        sig["significant_terms"]["background_filter"] = bf;
    }

    let inner = json!({ field: sig });
    (field.to_string(), wrap_sampler(sampler_kind, settings, auth_field, inner))
}

pub fn build_significant_text_aggregation(
    spec: &SignificantTextSpec,
    background_filter: Option<Value>,
    sampler_kind: SamplerKind,
    settings: &Settings,
    auth_field: &str,
) -> (String, Value) {
    let size = spec.size.unwrap_or(settings.facet_default_size) as u64;
    let shard_size = spec.shard_size.map(|s| s as u64).unwrap_or_else(|| (size * 5).max(100));
    let min_doc_count = spec.min_doc_count.unwrap_or(settings.min_doc_count);

    let mut sig = json!({
        "significant_text": {
            "field": spec.field,
            "filter_duplicate_text": true,
            "size": size,
            "min_doc_count": min_doc_count,
            "shard_size": shard_size,
        }
    });
    if let Some(bf) = background_filter {
        sig["significant_text"]["background_filter"] = bf;
    }

    let inner = json!({ &spec.field: sig });
    (spec.field.clone(), wrap_sampler(sampler_kind, settings, auth_field, inner))
}

/// `background_filter` scoping: restrict to the active datasets/collections
/// on `auth_field` when any are set, otherwise omit the filter so the
/// sampler uses whole-index statistics as the baseline.
pub fn background_filter(auth_field: &str, effective_datasets: &[String]) -> Option<Value> {
    if effective_datasets.is_empty() {
        None
    } else {
        crate::clauses::terms(auth_field, effective_datasets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facet_aggregation_uses_terms_by_default() {
        let spec = FacetSpec { field: "countries".to_string(), ..Default::default() };
        let settings = Settings::default();
        let (name, agg) = build_facet_aggregation("countries", &spec, json!({ "match_all": {} }), &settings, true, false, None);
        assert_eq!(name, "countries");
        assert_eq!(agg["aggs"]["countries"]["terms"]["field"], json!("countries"));
    }

    #[test]
    fn facet_aggregation_switches_to_date_histogram_with_bounds() {
        let spec = FacetSpec {
            field: "created_at".to_string(),
            interval: Some("month".to_string()),
            ..Default::default()
        };
        let settings = Settings::default();
        let (_, agg) = build_facet_aggregation(
            "created_at",
            &spec,
            json!({ "match_all": {} }),
            &settings,
            true,
            true,
            Some(("2023-01-01".to_string(), "2023-12-31".to_string())),
        );
        assert_eq!(agg["aggs"]["created_at"]["date_histogram"]["calendar_interval"], json!("month"));
        assert_eq!(agg["aggs"]["created_at"]["date_histogram"]["extended_bounds"]["min"], json!("2023-01-01"));
    }

    #[test]
    fn date_histogram_uses_fixed_interval_for_arbitrary_multiples() {
        let spec = FacetSpec {
            field: "created_at".to_string(),
            interval: Some("30m".to_string()),
            ..Default::default()
        };
        let settings = Settings::default();
        let (_, agg) = build_facet_aggregation("created_at", &spec, json!({ "match_all": {} }), &settings, true, true, None);
        assert_eq!(agg["aggs"]["created_at"]["date_histogram"]["fixed_interval"], json!("30m"));
        assert!(agg["aggs"]["created_at"]["date_histogram"]["calendar_interval"].is_null());
    }

    #[test]
    fn unauthenticated_caller_gets_no_cardinality_total() {
        let spec = FacetSpec { field: "names".to_string(), total: true, ..Default::default() };
        let settings = Settings::default();
        let (_, agg) = build_facet_aggregation("names", &spec, json!({}), &settings, false, false, None);
        assert!(agg["aggs"].get("names_total").is_none());
    }

    #[test]
    fn sampler_kind_picks_diversified_without_scope() {
        let settings = Settings::default();
        assert_eq!(choose_sampler_kind(false, &settings, None), SamplerKind::Diversified);
        assert_eq!(choose_sampler_kind(true, &settings, None), SamplerKind::Plain);
    }

    #[test]
    fn background_filter_omitted_without_scope() {
        assert!(background_filter("dataset", &[]).is_none());
        assert!(background_filter("dataset", &["a".to_string()]).is_some());
    }
}
