use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use crate::http::{build_client, post_json_with_retry};
use anyhow::Result;

/// Embedding provider backed by the OpenAI `/embeddings` endpoint
///
/// The blocking HTTP client is built per batch so it is created and dropped
/// on the calling (blocking) thread.
pub struct OpenAIEmbedder {
    url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(
        model: &str,
        api_key: String,
        api_base_url: &str,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let dimension = dimension_for_model(model).ok_or_else(|| {
            EmbeddingError::InitializationFailed(format!("unknown OpenAI embedding model '{}'", model))
        })?;

        Ok(Self {
            url: format!("{}/embeddings", api_base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            dimension,
            timeout_secs,
            max_retries,
        })
    }
}

fn dimension_for_model(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

impl EmbeddingProvider for OpenAIEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Requesting {} embeddings from {}", texts.len(), self.model);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let client = build_client(self.timeout_secs)?;
        let json = post_json_with_retry(
            &client,
            &self.url,
            &self.api_key,
            &body,
            self.max_retries,
        )?;
        let embeddings = parse_embedding_response(&json)?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ))
            .into());
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            EmbeddingError::GenerationFailed("response is missing the data array".to_string())
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                EmbeddingError::GenerationFailed("response item has no embedding".to_string())
            })?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);

        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
