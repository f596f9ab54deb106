pub mod gemini;

use async_trait::async_trait;

use crate::core::errors::ApiError;

pub use gemini::GeminiClient;

/// Answer generation seam. Implementations fail with the generation
/// error kind on upstream failure or an empty completion.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;
}

/// Text-to-vector seam, used by the store wrapper for query and
/// document embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    fn dimension(&self) -> usize;
}
