//! Executes a built query against the cluster through an injected transport,
//! keeping the query core itself free of I/O.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use search_types::{index_name, Bucket};

use crate::error::{Error, Result};
use crate::query::QueryBuilder;
use crate::settings::Settings;

/// The cluster-facing boundary: one `_search` call and one `_bulk` call.
/// Implementors own retry policy for transient failures (see
/// [`ReqwestTransport`] for the production implementation); the executor
/// itself only classifies non-retryable cluster errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn search(&self, indices: &[String], routing: Option<&str>, body: Value) -> Result<Value>;
    async fn bulk(&self, body: String) -> Result<Value>;
    /// `PUT /{index}/_settings`, used to relax and restore `refresh_interval`
    /// around bulk loads.
    async fn put_settings(&self, index: &str, body: Value) -> Result<Value>;
}

pub struct Executor<'a> {
    transport: &'a dyn Transport,
    settings: &'a Settings,
}

impl<'a> Executor<'a> {
    pub fn new(transport: &'a dyn Transport, settings: &'a Settings) -> Self {
        Executor { transport, settings }
    }

    /// Resolves indices from `query.buckets()` x `settings.index_read`, sends
    /// the request and returns the raw response, optionally dehydrated.
    #[tracing::instrument(skip(self, query), fields(routing_key, indices))]
    pub async fn search(&self, query: &dyn QueryBuilder, offset: usize, limit: usize, routing_key: Option<&str>, dehydrate: bool) -> Result<Value> {
        let indices = self.indices_for(&query.buckets());
        tracing::Span::current().record("indices", tracing::field::debug(&indices));
        tracing::Span::current().record("routing_key", tracing::field::debug(&routing_key));

        let body = query.to_request_body(offset, limit);
        let mut response = self.transport.search(&indices, routing_key, body).await?;

        if dehydrate {
            dehydrate_response(&mut response);
        }
        Ok(response)
    }

    fn indices_for(&self, buckets: &[Bucket]) -> Vec<String> {
        let mut indices = Vec::new();
        for version in &self.settings.index_read {
            for bucket in buckets {
                indices.push(index_name(&self.settings.index_prefix, *bucket, version));
            }
        }
        indices
    }
}

/// Strips `_source.properties` from every hit, leaving the rest of the
/// response untouched.
fn dehydrate_response(response: &mut Value) {
    if let Some(hits) = response.pointer_mut("/hits/hits").and_then(|h| h.as_array_mut()) {
        for hit in hits {
            if let Some(source) = hit.get_mut("_source").and_then(|s| s.as_object_mut()) {
                source.remove("properties");
            }
        }
    }
}

/// The production [`Transport`]: a plain `reqwest` client issuing
/// `POST /{indices}/_search` and `POST /_bulk`, retrying transport-level and
/// 429 failures with exponential backoff up to `settings.max_retries`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl ReqwestTransport {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .expect("reqwest client builder never fails for these options");
        ReqwestTransport {
            client,
            base_url: settings.uri.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        }
    }

    async fn post_with_retry(&self, path: &str, body: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.client.post(format!("{}{path}", self.base_url)).json(&body).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| Error::Transport { attempts: attempt, message: e.to_string() });
                    }
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let body_text = response.text().await.unwrap_or_default();
                    if retryable && attempt <= self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    if retryable {
                        return Err(Error::Transport { attempts: attempt, message: body_text });
                    }
                    return Err(Error::Cluster { status: status.as_u16(), body: body_text });
                }
                Err(e) => {
                    if attempt <= self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::Transport { attempts: attempt, message: e.to_string() });
                }
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100u64.saturating_mul(1u64 << attempt.min(10)))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn search(&self, indices: &[String], routing: Option<&str>, body: Value) -> Result<Value> {
        let joined = indices.join(",");
        let mut path = format!("/{joined}/_search");
        if let Some(r) = routing {
            path.push_str("?routing=");
            path.push_str(r);
        }
        self.post_with_retry(&path, body).await
    }

    async fn bulk(&self, body: String) -> Result<Value> {
        let value: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        self.post_with_retry("/_bulk", value).await
    }

    async fn put_settings(&self, index: &str, body: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .put(format!("{}/{index}/_settings", self.base_url))
                .json(&body)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| Error::Transport { attempts: attempt, message: e.to_string() });
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let body_text = response.text().await.unwrap_or_default();
                    if retryable && attempt <= self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(Error::Cluster { status: status.as_u16(), body: body_text });
                }
                Err(_) if attempt <= self.max_retries => {
                    tokio::time::sleep(backoff(attempt)).await;
                    continue;
                }
                Err(e) => return Err(Error::Transport { attempts: attempt, message: e.to_string() }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse;
    use crate::query::EntitiesQuery;
    use search_types::InMemorySchemaCatalog;
    use std::sync::Mutex;

    struct FakeTransport {
        last_indices: Mutex<Vec<String>>,
        response: Value,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn search(&self, indices: &[String], _routing: Option<&str>, _body: Value) -> Result<Value> {
            *self.last_indices.lock().unwrap() = indices.to_vec();
            Ok(self.response.clone())
        }
        async fn bulk(&self, _body: String) -> Result<Value> {
            Ok(serde_json::json!({ "errors": false }))
        }
        async fn put_settings(&self, _index: &str, _body: Value) -> Result<Value> {
            Ok(serde_json::json!({ "acknowledged": true }))
        }
    }

    #[tokio::test]
    async fn resolves_one_index_per_bucket_and_version() {
        let mut settings = Settings::default();
        settings.index_read = vec!["v1".to_string(), "v2".to_string()];
        let catalog = InMemorySchemaCatalog::builder().schema("Thing", &[], vec![], false).build();
        let parsed = parse(&[], &settings, None).unwrap();
        let query = EntitiesQuery::new(&parsed, &settings, &catalog);

        let transport = FakeTransport { last_indices: Mutex::new(Vec::new()), response: serde_json::json!({ "hits": { "hits": [] } }) };
        let executor = Executor::new(&transport, &settings);
        executor.search(&query, 0, 20, None, false).await.unwrap();

        let indices = transport.last_indices.lock().unwrap().clone();
        assert_eq!(indices.len(), 8); // 4 buckets x 2 versions
    }

    #[tokio::test]
    async fn dehydrate_strips_properties_from_hits() {
        let settings = Settings::default();
        let catalog = InMemorySchemaCatalog::builder().schema("Thing", &[], vec![], false).build();
        let parsed = parse(&[], &settings, None).unwrap();
        let query = EntitiesQuery::new(&parsed, &settings, &catalog);

        let response = serde_json::json!({
            "hits": { "hits": [{ "_id": "e1", "_source": { "properties": {"name": ["x"]}, "caption": "x" } }] }
        });
        let transport = FakeTransport { last_indices: Mutex::new(Vec::new()), response };
        let executor = Executor::new(&transport, &settings);
        let result = executor.search(&query, 0, 20, None, true).await.unwrap();
        let source = &result["hits"]["hits"][0]["_source"];
        assert!(source.get("properties").is_none());
        assert_eq!(source["caption"], serde_json::json!("x"));
    }
}
