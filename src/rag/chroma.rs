//! Chroma-backed document store, spoken to over the v2 REST API.
//!
//! The store owns persistence and nearest-neighbor search; this module is
//! request shaping. Query and document vectors come from the configured
//! `Embedder`, because the REST surface accepts embeddings, not raw text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use super::context::truncate_preview;
use super::retry::RetryPolicy;
use super::store::{
    CollectionStats, DocumentStore, DocumentSummary, RetrievedMatch, StoredDocument,
};
use crate::core::config::ChromaSettings;
use crate::core::errors::ApiError;
use crate::llm::Embedder;

const LIST_PREVIEW_CHARS: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ChromaStore {
    client: Client,
    base_url: String,
    tenant: String,
    database: String,
    collection_name: String,
    /// Replaced on reset, when the collection is dropped and recreated.
    collection_id: RwLock<String>,
    embedder: Arc<dyn Embedder>,
}

impl ChromaStore {
    /// Resolves the collection with `get_or_create`, driven by the
    /// bounded retry policy since the store may still be starting up.
    pub async fn connect(
        settings: &ChromaSettings,
        embedder: Arc<dyn Embedder>,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::internal)?;

        let store = Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            tenant: settings.tenant.clone(),
            database: settings.database.clone(),
            collection_name: settings.collection_name.clone(),
            collection_id: RwLock::new(String::new()),
            embedder,
        };

        let id = retry
            .run("chroma collection resolution", || {
                store.get_or_create_collection()
            })
            .await?;
        tracing::info!(
            "connected to chroma collection '{}' ({})",
            store.collection_name,
            id
        );
        *store.collection_id.write().await = id;

        Ok(store)
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    async fn collection_url(&self, suffix: &str) -> String {
        let id = self.collection_id.read().await;
        format!("{}/{}/{}", self.collections_url(), id, suffix)
    }

    async fn get_or_create_collection(&self) -> Result<String, ApiError> {
        let body = json!({
            "name": self.collection_name,
            "get_or_create": true,
            "metadata": { "description": "Document embeddings for RAG system" },
        });
        let payload = self.post_json(&self.collections_url(), body).await?;
        payload["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Retrieval("collection response is missing an id".into()))
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value, ApiError> {
        let res = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::retrieval)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "chroma request failed ({status}): {text}"
            )));
        }
        res.json().await.map_err(ApiError::retrieval)
    }
}

#[async_trait]
impl DocumentStore for ChromaStore {
    async fn add(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, ApiError> {
        if texts.is_empty() {
            return Err(ApiError::Validation("no documents provided".into()));
        }
        if let Some(ids) = &ids {
            if ids.len() != texts.len() {
                return Err(ApiError::Validation(format!(
                    "got {} ids for {} documents",
                    ids.len(),
                    texts.len()
                )));
            }
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != texts.len() {
                return Err(ApiError::Validation(format!(
                    "got {} metadatas for {} documents",
                    metadatas.len(),
                    texts.len()
                )));
            }
        }

        let ids = ids.unwrap_or_else(|| {
            texts
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect()
        });
        let metadatas: Vec<Map<String, Value>> = match metadatas {
            Some(metadatas) => metadatas.into_iter().map(flatten_metadata).collect(),
            None => texts.iter().map(|_| default_metadata()).collect(),
        };

        let embeddings = self.embedder.embed_batch(&texts).await?;

        let url = self.collection_url("add").await;
        self.post_json(
            &url,
            json!({
                "ids": &ids,
                "documents": texts,
                "embeddings": embeddings,
                "metadatas": metadatas,
            }),
        )
        .await?;

        tracing::info!("added {} documents to collection", ids.len());
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<Map<String, Value>>,
    ) -> Result<Vec<RetrievedMatch>, ApiError> {
        let embedding = self.embedder.embed(query).await?;

        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": limit.max(1),
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(filter) = filter {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("where".to_string(), Value::Object(filter));
            }
        }

        let url = self.collection_url("query").await;
        let payload = self.post_json(&url, body).await?;
        let matches = parse_query_response(&payload)?;
        tracing::info!("found {} similar documents", matches.len());
        Ok(matches)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>, ApiError> {
        let url = self.collection_url("get").await;
        let payload = self
            .post_json(
                &url,
                json!({ "ids": [id], "include": ["documents", "metadatas"] }),
            )
            .await?;
        Ok(parse_get_response(&payload).into_iter().next())
    }

    async fn update(
        &self,
        id: &str,
        text: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<bool, ApiError> {
        if text.is_none() && metadata.is_none() {
            return Err(ApiError::Validation(
                "update requires a document or metadata".into(),
            ));
        }
        if self.get(id).await?.is_none() {
            return Ok(false);
        }

        let mut body = json!({ "ids": [id] });
        let obj = body
            .as_object_mut()
            .ok_or_else(|| ApiError::Internal("update body is not an object".into()))?;
        if let Some(text) = text {
            // text change invalidates the stored vector
            let embedding = self.embedder.embed(&text).await?;
            obj.insert("documents".to_string(), json!([text]));
            obj.insert("embeddings".to_string(), json!([embedding]));
        }
        if let Some(metadata) = metadata {
            obj.insert(
                "metadatas".to_string(),
                json!([flatten_metadata(metadata)]),
            );
        }

        let url = self.collection_url("update").await;
        self.post_json(&url, body).await?;
        tracing::info!("updated document {}", id);
        Ok(true)
    }

    async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        if self.get(id).await?.is_none() {
            return Ok(false);
        }
        let url = self.collection_url("delete").await;
        self.post_json(&url, json!({ "ids": [id] })).await?;
        tracing::info!("deleted document {}", id);
        Ok(true)
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<DocumentSummary>, usize), ApiError> {
        let total = self.stats().await?.total_documents;

        let url = self.collection_url("get").await;
        let payload = self
            .post_json(
                &url,
                json!({
                    "limit": limit.max(1),
                    "offset": offset,
                    "include": ["documents", "metadatas"],
                }),
            )
            .await?;

        let summaries = parse_get_response(&payload)
            .into_iter()
            .map(|doc| DocumentSummary {
                content_preview: truncate_preview(&doc.text, LIST_PREVIEW_CHARS),
                content_length: doc.text.chars().count(),
                id: doc.id,
                metadata: doc.metadata,
            })
            .collect();
        Ok((summaries, total))
    }

    async fn stats(&self) -> Result<CollectionStats, ApiError> {
        let url = self.collection_url("count").await;
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::retrieval)?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "chroma count failed ({status}): {text}"
            )));
        }
        let count: usize = res.json().await.map_err(ApiError::retrieval)?;
        Ok(CollectionStats {
            total_documents: count,
            collection_name: self.collection_name.clone(),
        })
    }

    async fn reset(&self) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.collections_url(), self.collection_name);
        let res = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(ApiError::retrieval)?;
        // 404 means the collection was already gone
        if !res.status().is_success() && res.status() != reqwest::StatusCode::NOT_FOUND {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Retrieval(format!(
                "chroma collection delete failed ({status}): {text}"
            )));
        }

        let id = self.get_or_create_collection().await?;
        *self.collection_id.write().await = id;
        tracing::info!("reset collection {}", self.collection_name);
        Ok(())
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/api/v2/healthcheck", self.base_url);
        match self.client.get(&url).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}

fn default_metadata() -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    metadata
}

/// Chroma only stores primitive metadata values; nested structures are
/// JSON-stringified rather than rejected.
fn flatten_metadata(metadata: Map<String, Value>) -> Map<String, Value> {
    metadata
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => (key, value),
            other => (key, Value::String(other.to_string())),
        })
        .collect()
}

/// Query responses nest every field one level per query embedding; we
/// always send exactly one. A missing or non-numeric distance is a
/// malformed response, not a perfect match, so it fails rather than
/// defaulting.
fn parse_query_response(payload: &Value) -> Result<Vec<RetrievedMatch>, ApiError> {
    let ids = string_list(&payload["ids"][0]);
    let documents = string_list(&payload["documents"][0]);
    let metadatas = &payload["metadatas"][0];
    let distances = &payload["distances"][0];

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| {
            let distance = distances[i].as_f64().ok_or_else(|| {
                ApiError::Retrieval(format!(
                    "query response has a non-numeric distance for '{}': {}",
                    id, distances[i]
                ))
            })?;
            Ok(RetrievedMatch {
                text: documents.get(i).cloned().unwrap_or_default(),
                metadata: metadata_at(metadatas, i),
                distance,
                id,
            })
        })
        .collect()
}

/// Get responses use flat, parallel lists.
fn parse_get_response(payload: &Value) -> Vec<StoredDocument> {
    let ids = string_list(&payload["ids"]);
    let documents = string_list(&payload["documents"]);
    let metadatas = &payload["metadatas"];

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| StoredDocument {
            text: documents.get(i).cloned().unwrap_or_default(),
            metadata: metadata_at(metadatas, i),
            id,
        })
        .collect()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn metadata_at(metadatas: &Value, index: usize) -> Map<String, Value> {
    metadatas[index].as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_response_parses_nested_lists() {
        let payload = json!({
            "ids": [["a", "b"]],
            "documents": [["first text", "second text"]],
            "metadatas": [[{ "source": "x.txt" }, null]],
            "distances": [[0.12, 0.95]],
        });

        let matches = parse_query_response(&payload).expect("parse");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(matches[0].text, "first text");
        assert_eq!(matches[0].metadata["source"], json!("x.txt"));
        assert_eq!(matches[0].distance, 0.12);
        // null metadata degrades to an empty map
        assert!(matches[1].metadata.is_empty());
        assert_eq!(matches[1].distance, 0.95);
    }

    #[test]
    fn empty_query_response_parses_to_no_matches() {
        let payload = json!({
            "ids": [[]],
            "documents": [[]],
            "metadatas": [[]],
            "distances": [[]],
        });
        assert!(parse_query_response(&payload).expect("parse").is_empty());
    }

    #[test]
    fn null_distance_is_a_retrieval_error() {
        let payload = json!({
            "ids": [["a"]],
            "documents": [["text"]],
            "metadatas": [[null]],
            "distances": [[null]],
        });
        assert!(matches!(
            parse_query_response(&payload),
            Err(ApiError::Retrieval(_))
        ));

        let missing = json!({
            "ids": [["a"]],
            "documents": [["text"]],
            "metadatas": [[null]],
        });
        assert!(parse_query_response(&missing).is_err());
    }

    #[test]
    fn get_response_uses_flat_lists() {
        let payload = json!({
            "ids": ["doc-1"],
            "documents": ["hello"],
            "metadatas": [{ "k": 1 }],
        });
        let docs = parse_get_response(&payload);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "doc-1");
        assert_eq!(docs[0].text, "hello");
        assert_eq!(docs[0].metadata["k"], json!(1));
    }

    #[test]
    fn flatten_keeps_primitives_and_stringifies_the_rest() {
        let mut metadata = Map::new();
        metadata.insert("s".to_string(), json!("str"));
        metadata.insert("n".to_string(), json!(3));
        metadata.insert("b".to_string(), json!(true));
        metadata.insert("nested".to_string(), json!({ "a": 1 }));
        metadata.insert("list".to_string(), json!([1, 2]));

        let flat = flatten_metadata(metadata);
        assert_eq!(flat["s"], json!("str"));
        assert_eq!(flat["n"], json!(3));
        assert_eq!(flat["b"], json!(true));
        assert_eq!(flat["nested"], json!("{\"a\":1}"));
        assert_eq!(flat["list"], json!("[1,2]"));
    }
}
