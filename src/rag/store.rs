//! DocumentStore trait — abstract interface for the vector-database backend.
//!
//! The primary implementation is `ChromaStore` in the `chroma` module;
//! similarity search, persistence and ranking are owned by the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::ApiError;

/// One candidate returned by a similarity query, in store order
/// (best-first). `distance` is a dissimilarity score: lower means more
/// similar, and it is not guaranteed to be bounded to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMatch {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
    pub distance: f64,
}

/// A stored document as returned by get.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// List entry: preview only, never the full text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub content_preview: String,
    pub content_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    pub collection_name: String,
}

/// Abstract trait for the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add documents; ids are autogenerated (uuid v4) when absent and
    /// missing metadata defaults to a timestamp entry. Returns the ids.
    async fn add(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Map<String, Value>>>,
        ids: Option<Vec<String>>,
    ) -> Result<Vec<String>, ApiError>;

    /// Similarity search: embeds the query and returns up to `limit`
    /// matches in store order with distances.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<Map<String, Value>>,
    ) -> Result<Vec<RetrievedMatch>, ApiError>;

    async fn get(&self, id: &str) -> Result<Option<StoredDocument>, ApiError>;

    /// Update text and/or metadata; re-embeds when the text changes.
    /// Returns false when the document does not exist.
    async fn update(
        &self,
        id: &str,
        text: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<bool, ApiError>;

    /// Returns false when the document does not exist.
    async fn delete(&self, id: &str) -> Result<bool, ApiError>;

    /// Paginated listing with previews; also returns the total count.
    async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<DocumentSummary>, usize), ApiError>;

    async fn stats(&self) -> Result<CollectionStats, ApiError>;

    /// Drops and recreates the collection.
    async fn reset(&self) -> Result<(), ApiError>;

    async fn healthy(&self) -> bool;
}
