//! Gemini REST client: generation and embeddings over the v1beta API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Embedder, Generator};
use crate::core::config::GeminiSettings;
use crate::core::errors::ApiError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    embedding_dimension: usize,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self, ApiError> {
        if settings.api_key.is_empty() {
            tracing::warn!("gemini api key not configured; generation requests will fail");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            embedding_model: settings.embedding_model.clone(),
            embedding_dimension: settings.embedding_dimension,
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn post(&self, url: &str, body: Value, operation: &str) -> Result<Value, ApiError> {
        let res = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Generation(format!("gemini {operation} failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "gemini {operation} failed ({status}): {text}"
            )));
        }
        res.json()
            .await
            .map_err(|e| ApiError::Generation(format!("gemini {operation} failed: {e}")))
    }

    fn model_url(&self, model: &str, action: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, action)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = self.model_url(&self.model, "generateContent");
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let payload = self.post(&url, body, "generateContent").await?;
        let text = extract_completion(&payload)?;
        tracing::info!("generated {} characters", text.len());
        Ok(text)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = self.model_url(&self.embedding_model, "embedContent");
        let body = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] },
        });

        let payload = self.post(&url, body, "embedContent").await?;
        extract_vector(&payload["embedding"])
            .ok_or_else(|| ApiError::Generation("embedding response has no values".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.model_url(&self.embedding_model, "batchEmbedContents");
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.embedding_model),
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let payload = self
            .post(&url, json!({ "requests": requests }), "batchEmbedContents")
            .await?;
        let embeddings = extract_batch_vectors(&payload);
        if embeddings.len() != texts.len() {
            return Err(ApiError::Generation(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }
}

/// An upstream 200 with no candidate text still counts as a generation
/// failure.
fn extract_completion(payload: &Value) -> Result<String, ApiError> {
    let text = payload
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::Generation(
            "empty response from gemini model".into(),
        ));
    }
    Ok(text.to_string())
}

fn extract_vector(embedding: &Value) -> Option<Vec<f32>> {
    let values = embedding["values"].as_array()?;
    Some(
        values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect(),
    )
}

fn extract_batch_vectors(payload: &Value) -> Vec<Vec<f32>> {
    payload["embeddings"]
        .as_array()
        .map(|items| items.iter().filter_map(extract_vector).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_is_extracted_from_first_candidate() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "the answer" }] },
            }],
        });
        assert_eq!(extract_completion(&payload).expect("text"), "the answer");
    }

    #[test]
    fn empty_completion_is_a_generation_error() {
        let payload = json!({ "candidates": [] });
        assert!(matches!(
            extract_completion(&payload),
            Err(ApiError::Generation(_))
        ));

        let blank = json!({
            "candidates": [{ "content": { "parts": [{ "text": "" }] } }],
        });
        assert!(extract_completion(&blank).is_err());
    }

    #[test]
    fn vectors_are_extracted_from_embed_responses() {
        let single = json!({ "values": [0.1, 0.2, 0.3] });
        assert_eq!(extract_vector(&single).expect("vector").len(), 3);

        let batch = json!({
            "embeddings": [
                { "values": [0.1, 0.2] },
                { "values": [0.3, 0.4] },
            ],
        });
        let vectors = extract_batch_vectors(&batch);
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[test]
    fn client_builds_model_urls() {
        let client = GeminiClient::new(&GeminiSettings::default())
            .expect("client")
            .with_base_url("http://localhost:9999/v1beta".to_string());
        assert_eq!(
            client.model_url("gemini-2.5-flash", "generateContent"),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
