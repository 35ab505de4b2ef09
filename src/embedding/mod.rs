mod fastembed_manager;
mod openai;

pub use fastembed_manager::FastEmbedManager;
pub use openai::OpenAIEmbedder;

use crate::config::Config;
use crate::error::{ConfigError, EmbeddingError};
use anyhow::Result;
use std::sync::Arc;

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the provider selected by `embedding.provider`
pub fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedManager::from_model_name(
            &config.embedding.model_name,
        )?)),
        "openai" => {
            let api_key = config
                .openai
                .api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingRequired("OPENAI_API_KEY".to_string()))?;
            Ok(Arc::new(OpenAIEmbedder::new(
                &config.embedding.model_name,
                api_key,
                &config.chat.api_base_url,
                config.embedding.timeout_secs,
                config.chat.max_retries,
            )?))
        }
        other => Err(EmbeddingError::InitializationFailed(format!(
            "unknown embedding provider '{}'",
            other
        ))
        .into()),
    }
}
