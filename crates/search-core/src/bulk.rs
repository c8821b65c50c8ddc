//! Concurrent bulk ingestion: entities in, `_bulk` batches out, with
//! backpressure and per-item retry classification.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use search_types::{bucket_for_schema, index_name, Bucket, Entity, SchemaCatalog};

use crate::document::build_document;
use crate::error::{Error, Result};
use crate::executor::Transport;
use crate::name::NameProcessor;
use crate::settings::Settings;

/// Classification of one failed bulk item, per the §7 partial-bulk-failure
/// rule: version conflicts are dropped, 429/timeout retried, everything else
/// fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemFailure {
    VersionConflict,
    Retryable,
    Fatal,
}

fn classify_item_error(error_type: &str, status: u16) -> ItemFailure {
    if error_type.contains("version_conflict") {
        ItemFailure::VersionConflict
    } else if status == 429 || error_type.contains("timeout") {
        ItemFailure::Retryable
    } else {
        ItemFailure::Fatal
    }
}

/// Drives entities through document-building and batched `_bulk` submission.
///
/// Preprocessing (name pipeline, property typing) and network submission run
/// as separate concurrent stages connected by a bounded channel, so a slow
/// cluster applies backpressure to preprocessing rather than buffering
/// unboundedly.
pub struct BulkIndexer<T: Transport + 'static> {
    transport: Arc<T>,
    catalog: Arc<dyn SchemaCatalog>,
    dictionary: Arc<dyn crate::name::NameSymbolDictionary>,
    settings: Settings,
}

/// Outcome of one ingestion run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BulkReport {
    pub indexed: usize,
    pub dropped_conflicts: usize,
}

impl<T: Transport + 'static> BulkIndexer<T> {
    pub fn new(
        transport: Arc<T>,
        catalog: Arc<dyn SchemaCatalog>,
        dictionary: Arc<dyn crate::name::NameSymbolDictionary>,
        settings: Settings,
    ) -> Self {
        BulkIndexer { transport, catalog, dictionary, settings }
    }

    /// Consumes `entities`, building documents and submitting `_bulk` batches
    /// concurrently up to `settings.indexer_concurrency`, each batch capped
    /// by `indexer_chunk_size` documents or `indexer_max_chunk_bytes` bytes.
    ///
    /// Relaxes `refresh_interval` to `-1` on every write index for the
    /// duration of the run and restores it to `settings.index_refresh_interval`
    /// afterwards, even if the run fails; a failure to relax or restore is
    /// logged but never aborts or fails ingestion, since it only costs
    /// indexing throughput, not correctness.
    #[tracing::instrument(skip(self, entities))]
    pub async fn run(&self, entities: Vec<Entity>, indexed_at: DateTime<Utc>) -> Result<BulkReport> {
        let write_indices: Vec<String> = Bucket::ALL
            .iter()
            .map(|b| index_name(&self.settings.index_prefix, *b, &self.settings.index_write))
            .collect();
        self.set_refresh_interval(&write_indices, "-1").await;

        let result = self.run_inner(entities, indexed_at).await;

        self.set_refresh_interval(&write_indices, &self.settings.index_refresh_interval).await;
        result
    }

    async fn set_refresh_interval(&self, indices: &[String], value: &str) {
        let body = serde_json::json!({ "index": { "refresh_interval": value } });
        for index in indices {
            if let Err(e) = self.transport.put_settings(index, body.clone()).await {
                tracing::warn!(%index, refresh_interval = value, error = %e, "failed to update refresh_interval");
            }
        }
    }

    async fn run_inner(&self, entities: Vec<Entity>, indexed_at: DateTime<Utc>) -> Result<BulkReport> {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(self.settings.indexer_concurrency * 2);
        let chunk_size = self.settings.indexer_chunk_size;
        let max_bytes = self.settings.indexer_max_chunk_bytes;

        let catalog = self.catalog.clone();
        let dictionary = self.dictionary.clone();
        let index_version = self.settings.index_write.clone();
        let index_prefix = self.settings.index_prefix.clone();

        let producer = tokio::spawn(async move {
            let processor = NameProcessor::new(catalog.as_ref(), dictionary.as_ref());
            let mut batch_lines: Vec<String> = Vec::new();
            let mut batch_bytes = 0usize;

            for entity in entities {
                let bucket = bucket_for_schema(catalog.as_ref(), &entity.schema);
                let doc = match build_document(&entity, catalog.as_ref(), &processor, bucket, &index_version, indexed_at) {
                    Ok(doc) => doc,
                    Err(e) => {
                        tracing::warn!(entity = %entity.id, error = %e, "skipping entity that failed to build a document");
                        continue;
                    }
                };
                let index = index_name(&index_prefix, bucket, &index_version);
                let (action, source) = doc.bulk_action(&index, &entity.id);
                let line = format!("{}\n{}\n", action, source);
                batch_bytes += line.len();
                batch_lines.push(line);

                if batch_lines.len() >= chunk_size || batch_bytes >= max_bytes {
                    let payload = batch_lines.concat().into_bytes();
                    if tx.send(payload).await.is_err() {
                        return;
                    }
                    batch_lines.clear();
                    batch_bytes = 0;
                }
            }
            if !batch_lines.is_empty() {
                let payload = batch_lines.concat().into_bytes();
                let _ = tx.send(payload).await;
            }
        });

        let report = self.submit_batches(rx).await?;
        producer.await.map_err(|e| Error::Transport { attempts: 0, message: e.to_string() })?;
        Ok(report)
    }

    async fn submit_batches(&self, mut rx: mpsc::Receiver<Vec<u8>>) -> Result<BulkReport> {
        let mut inflight = JoinSet::new();
        let mut report = BulkReport::default();
        let max_retries = self.settings.max_retries;
        let mut channel_open = true;

        while channel_open || !inflight.is_empty() {
            tokio::select! {
                maybe_batch = rx.recv(), if channel_open && inflight.len() < self.settings.indexer_concurrency => {
                    match maybe_batch {
                        Some(batch) => {
                            let transport = self.transport.clone();
                            inflight.spawn(async move { submit_one_batch(transport, batch, max_retries).await });
                        }
                        None => channel_open = false,
                    }
                }
                Some(result) = inflight.join_next(), if !inflight.is_empty() => {
                    let batch_outcome = result.map_err(|e| Error::Transport { attempts: 0, message: e.to_string() })??;
                    report.indexed += batch_outcome.indexed;
                    report.dropped_conflicts += batch_outcome.dropped_conflicts;
                }
            }
        }

        Ok(report)
    }
}

/// Submits one `_bulk` payload, retrying the whole batch with exponential
/// backoff on a transport-level failure, then classifying per-item failures
/// from a successful response.
async fn submit_one_batch<T: Transport>(transport: Arc<T>, batch: Vec<u8>, max_retries: u32) -> Result<BulkReport> {
    let body = String::from_utf8(batch).expect("bulk lines are always valid utf-8");

    let mut attempt = 0;
    let response = loop {
        attempt += 1;
        match transport.bulk(body.clone()).await {
            Ok(response) => break response,
            Err(_) if attempt <= max_retries => {
                tokio::time::sleep(Duration::from_millis(100 * (1u64 << attempt.min(10)))).await;
                continue;
            }
            Err(e) => return Err(e),
        }
    };

    classify_bulk_response(&response)
}

fn classify_bulk_response(response: &serde_json::Value) -> Result<BulkReport> {
    let mut report = BulkReport::default();
    let items = response.get("items").and_then(|i| i.as_array()).cloned().unwrap_or_default();
    let mut first_reason = None;
    let mut fatal_count = 0usize;

    for item in &items {
        let Some(action) = item.as_object().and_then(|o| o.values().next()) else { continue };
        let Some(error) = action.get("error") else {
            report.indexed += 1;
            continue;
        };
        let error_type = error.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let status = action.get("status").and_then(|s| s.as_u64()).unwrap_or(0) as u16;

        match classify_item_error(error_type, status) {
            ItemFailure::VersionConflict => report.dropped_conflicts += 1,
            ItemFailure::Retryable | ItemFailure::Fatal => {
                fatal_count += 1;
                if first_reason.is_none() {
                    first_reason = error.get("reason").and_then(|r| r.as_str()).map(|s| s.to_string());
                }
            }
        }
    }

    if fatal_count > 0 {
        return Err(Error::Bulk {
            total: items.len(),
            failed: fatal_count,
            first_reason: first_reason.unwrap_or_default(),
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_version_conflicts_as_dropped() {
        assert_eq!(classify_item_error("version_conflict_engine_exception", 409), ItemFailure::VersionConflict);
    }

    #[test]
    fn classifies_429_as_retryable() {
        assert_eq!(classify_item_error("es_rejected_execution_exception", 429), ItemFailure::Retryable);
    }

    #[test]
    fn classifies_other_errors_as_fatal() {
        assert_eq!(classify_item_error("mapper_parsing_exception", 400), ItemFailure::Fatal);
    }

    #[test]
    fn bulk_response_with_only_conflicts_is_ok() {
        let response = serde_json::json!({
            "items": [
                { "index": { "status": 409, "error": { "type": "version_conflict_engine_exception", "reason": "x" } } },
                { "index": { "status": 201 } }
            ]
        });
        let report = classify_bulk_response(&response).unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.dropped_conflicts, 1);
    }

    #[test]
    fn bulk_response_with_fatal_error_is_err() {
        let response = serde_json::json!({
            "items": [
                { "index": { "status": 400, "error": { "type": "mapper_parsing_exception", "reason": "bad field" } } }
            ]
        });
        let err = classify_bulk_response(&response).unwrap_err();
        assert!(matches!(err, Error::Bulk { failed: 1, .. }));
    }
}
