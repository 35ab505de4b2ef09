use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// FastEmbed-based local embedding provider
pub struct FastEmbedManager {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedManager {
    /// Create a new FastEmbedManager with the default model (all-MiniLM-L6-v2)
    pub fn new() -> Result<Self> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2)
    }

    /// Create a manager from a model name such as "BAAI/bge-small-en-v1.5"
    pub fn from_model_name(name: &str) -> Result<Self> {
        let model = parse_model_name(name).ok_or_else(|| {
            EmbeddingError::InitializationFailed(format!("unsupported fastembed model '{}'", name))
        })?;
        Self::with_model(model)
    }

    /// Create a new FastEmbedManager with a specific model
    pub fn with_model(model: EmbeddingModel) -> Result<Self> {
        tracing::info!("Initializing FastEmbed model: {:?}", model);

        let (model_name, dimension) = match model {
            EmbeddingModel::AllMiniLML6V2 => ("all-MiniLM-L6-v2", 384),
            EmbeddingModel::AllMiniLML12V2 => ("all-MiniLM-L12-v2", 384),
            EmbeddingModel::BGEBaseENV15 => ("BAAI/bge-base-en-v1.5", 768),
            EmbeddingModel::BGESmallENV15 => ("BAAI/bge-small-en-v1.5", 384),
            EmbeddingModel::BGELargeENV15 => ("BAAI/bge-large-en-v1.5", 1024),
            _ => ("unknown", 384),
        };

        let mut options = InitOptions::default();
        options.model_name = model;
        options.show_download_progress = true;

        let embedding_model =
            TextEmbedding::try_new(options).context("Failed to initialize FastEmbed model")?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Some(EmbeddingModel::AllMiniLML6V2)
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            Some(EmbeddingModel::AllMiniLML12V2)
        }
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => Some(EmbeddingModel::BGELargeENV15),
        _ => None,
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;
        let embeddings = model
            .embed(texts, None)
            .context("Failed to generate embeddings")?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
