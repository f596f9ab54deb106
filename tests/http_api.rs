//! End-to-end tests over a live server with in-process collaborators
//! behind the store and generator seams.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use ragport::core::config::Settings;
use ragport::core::errors::ApiError;
use ragport::history::ConversationStore;
use ragport::llm::{Embedder, Generator};
use ragport::rag::store::{
    CollectionStats, DocumentStore, DocumentSummary, RetrievedMatch, StoredDocument,
};
use ragport::rag::ContextAssembler;
use ragport::server::router::router;
use ragport::state::AppState;

struct FixedStore {
    matches: Vec<RetrievedMatch>,
}

#[async_trait]
impl DocumentStore for FixedStore {
    async fn add(
        &self,
        texts: Vec<String>,
        _metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, ApiError> {
        Ok(ids.unwrap_or_else(|| {
            texts
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect()
        }))
    }

    async fn search(
        &self,
        _query: &str,
        limit: usize,
        _filter: Option<Map<String, Value>>,
    ) -> Result<Vec<RetrievedMatch>, ApiError> {
        Ok(self.matches.iter().take(limit).cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>, ApiError> {
        if id == "doc-1" {
            Ok(Some(StoredDocument {
                id: id.to_string(),
                text: "stored text".to_string(),
                metadata: Map::new(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn update(
        &self,
        id: &str,
        _text: Option<String>,
        _metadata: Option<Map<String, Value>>,
    ) -> Result<bool, ApiError> {
        Ok(id == "doc-1")
    }

    async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        Ok(id == "doc-1")
    }

    async fn list(
        &self,
        _limit: usize,
        _offset: usize,
    ) -> Result<(Vec<DocumentSummary>, usize), ApiError> {
        Ok((Vec::new(), 0))
    }

    async fn stats(&self) -> Result<CollectionStats, ApiError> {
        Ok(CollectionStats {
            total_documents: self.matches.len(),
            collection_name: "documents".to_string(),
        })
    }

    async fn reset(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

/// Echoes the prompt so tests can see exactly what was composed.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        Ok(prompt.to_string())
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ApiError> {
        Ok(vec![0.0; 4])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }

    fn dimension(&self) -> usize {
        4
    }
}

fn make_match(id: &str, text: &str, distance: f64) -> RetrievedMatch {
    RetrievedMatch {
        id: id.to_string(),
        text: text.to_string(),
        metadata: Map::new(),
        distance,
    }
}

async fn spawn_app(matches: Vec<RetrievedMatch>) -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = Settings::default();
    settings.conversations.db_path = dir.path().join("conv.db");

    let conversations = ConversationStore::new(
        &settings.conversations.db_path,
        std::time::Duration::from_secs(3600),
    )
    .await
    .expect("conversation store");

    let assembler = ContextAssembler::new(
        settings.rag.distance_threshold,
        settings.rag.preview_length,
    );
    let limiter = RateLimiter::keyed(Quota::per_minute(
        NonZeroU32::new(1000).expect("nonzero"),
    ));

    let state = Arc::new(AppState {
        settings,
        store: Arc::new(FixedStore { matches }),
        generator: Arc::new(EchoGenerator),
        embedder: Arc::new(FixedEmbedder),
        assembler,
        conversations,
        limiter,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server");
    });

    (addr, dir)
}

#[tokio::test]
async fn health_carries_middleware_headers() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let res = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request");
    assert!(res.status().is_success());
    assert_eq!(
        res.headers().get("x-content-type-options").expect("header"),
        "nosniff"
    );
    assert!(res.headers().contains_key("x-process-time"));

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn chat_uses_rag_and_persists_the_conversation() {
    let matches = vec![
        make_match("a", "alpha text", 0.2),
        make_match("b", "far away text", 0.9),
    ];
    let (addr, _dir) = spawn_app(matches).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{addr}/chat"))
        .json(&json!({ "message": "what is alpha?" }))
        .send()
        .await
        .expect("request");
    assert!(res.status().is_success());

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["rag_used"], json!(true));
    // only the match under the 0.8 threshold is included
    let sources = body["sources"].as_array().expect("sources");
    assert_eq!(sources.len(), 1);
    assert!((sources[0]["score"].as_f64().expect("score") - 0.8).abs() < 1e-9);
    // the echo generator returns the composed prompt verbatim
    let response = body["response"].as_str().expect("response");
    assert!(response.contains("Context: alpha text"));
    assert!(response.contains("Question: what is alpha?"));
    assert!(!response.contains("far away text"));

    let conversation_id = body["conversation_id"].as_str().expect("id").to_string();
    let res = client
        .get(format!("http://{addr}/conversations/{conversation_id}"))
        .send()
        .await
        .expect("request");
    assert!(res.status().is_success());
    let conversation: Value = res.json().await.expect("json");
    let messages = conversation["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], json!("user"));
    assert_eq!(messages[1]["role"], json!("assistant"));
}

#[tokio::test]
async fn chat_without_relevant_matches_degrades_to_no_context() {
    let matches = vec![make_match("b", "far away text", 1.9)];
    let (addr, _dir) = spawn_app(matches).await;

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/chat"))
        .json(&json!({ "message": "anything" }))
        .send()
        .await
        .expect("request");
    let body: Value = res.json().await.expect("json");

    assert_eq!(body["rag_used"], json!(false));
    assert!(body.get("sources").is_none());
    assert_eq!(body["response"], json!("Question: anything"));
}

#[tokio::test]
async fn blank_chat_message_is_rejected() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/chat"))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .expect("request");
    assert_eq!(res.status().as_u16(), 400);

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["error"]["type"], json!("ValidationError"));
}

#[tokio::test]
async fn invalid_where_filter_is_a_validation_error() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let res = reqwest::get(format!(
        "http://{addr}/documents/search?query=x&where=not-json"
    ))
    .await
    .expect("request");
    assert_eq!(res.status().as_u16(), 400);

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["error"]["type"], json!("ValidationError"));
}

#[tokio::test]
async fn search_reports_query_and_count() {
    let matches = vec![make_match("a", "alpha text", 0.2)];
    let (addr, _dir) = spawn_app(matches).await;

    let res = reqwest::get(format!("http://{addr}/documents/search?query=alpha"))
        .await
        .expect("request");
    assert!(res.status().is_success());

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["query"], json!("alpha"));
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["results"][0]["id"], json!("a"));
    assert_eq!(body["results"][0]["content"], json!("alpha text"));
    assert!((body["results"][0]["distance"].as_f64().expect("distance") - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn embeddings_endpoints_report_dimension() {
    let (addr, _dir) = spawn_app(Vec::new()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("http://{addr}/embeddings/info"))
        .send()
        .await
        .expect("request");
    let body: Value = res.json().await.expect("json");
    assert_eq!(body["dimension"], json!(4));

    let res = client
        .post(format!("http://{addr}/embeddings/single"))
        .json(&json!({ "text": "hello" }))
        .send()
        .await
        .expect("request");
    assert!(res.status().is_success());
    let body: Value = res.json().await.expect("json");
    assert_eq!(body["embedding"].as_array().expect("vector").len(), 4);

    let res = client
        .post(format!("http://{addr}/embeddings/generate"))
        .json(&json!({ "texts": ["a", "b"] }))
        .send()
        .await
        .expect("request");
    let body: Value = res.json().await.expect("json");
    assert_eq!(body["count"], json!(2));
}

#[tokio::test]
async fn missing_document_maps_to_404_envelope() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let res = reqwest::get(format!("http://{addr}/documents/nope"))
        .await
        .expect("request");
    assert_eq!(res.status().as_u16(), 404);

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["error"]["type"], json!("DocumentNotFoundError"));
}

#[tokio::test]
async fn unsupported_upload_is_rejected_with_details() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let part = reqwest::multipart::Part::bytes(b"binary".to_vec()).file_name("tool.exe");
    let form = reqwest::multipart::Form::new().part("file", part);
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/documents/upload"))
        .multipart(form)
        .send()
        .await
        .expect("request");
    assert_eq!(res.status().as_u16(), 400);

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["error"]["type"], json!("UnsupportedFileTypeError"));
    assert!(body["error"]["details"]["supported_types"]
        .as_array()
        .expect("types")
        .iter()
        .any(|t| t == ".pdf"));
}

#[tokio::test]
async fn text_upload_is_extracted_and_stored() {
    let (addr, _dir) = spawn_app(Vec::new()).await;

    let part = reqwest::multipart::Part::bytes(b"plain file body".to_vec()).file_name("notes.txt");
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("metadata", "{\"author\": \"tester\"}");
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/documents/upload"))
        .multipart(form)
        .send()
        .await
        .expect("request");
    assert!(res.status().is_success());

    let body: Value = res.json().await.expect("json");
    assert_eq!(body["filename"], json!("notes.txt"));
    assert_eq!(body["text_length"], json!("plain file body".len()));
    assert_eq!(body["metadata"]["author"], json!("tester"));
    assert_eq!(body["metadata"]["file_type"], json!("text/plain"));
    assert!(body["document_id"].as_str().is_some());
}
