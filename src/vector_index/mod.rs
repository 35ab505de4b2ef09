//! Vector index of model descriptors.
//!
//! Every descriptor is stored under its model name with the rendered prompt
//! text as document and its tags as metadata. Queries are embedded with the
//! same provider used at upsert time.

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{EmbeddingError, VectorDbError};
use crate::model::ModelDescriptor;
use crate::types::{IndexedModel, ModelDocumentation, RankedResult, RecordMetadata};
use crate::vector_db::{self, DistanceMetric, VectorDatabase, VectorRecord};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Default number of results for a query
pub const DEFAULT_RESULT_LIMIT: usize = 3;

/// Outcome of an upsert call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Records embedded and written
    pub written: usize,
    /// Records whose stored content hash already matched
    pub unchanged: usize,
}

pub struct ModelVectorIndex {
    embedding: Arc<dyn EmbeddingProvider>,
    db: Arc<dyn VectorDatabase>,
    timeout_secs: u64,
    batch_size: usize,
}

impl ModelVectorIndex {
    /// Wrap an embedding provider and a database, creating the collection
    /// with the provider's dimension
    pub async fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        db: Arc<dyn VectorDatabase>,
        timeout_secs: u64,
    ) -> Result<Self> {
        db.initialize(embedding.dimension())
            .await
            .context("Failed to initialize vector database")?;

        Ok(Self {
            embedding,
            db,
            timeout_secs,
            batch_size: 32,
        })
    }

    /// Build the configured embedding provider and vector backend
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedding_config = config.clone();
        let provider = tokio::task::spawn_blocking(move || {
            embedding::create_provider(&embedding_config)
        })
        .await
        .context("Embedding initialization task panicked")??;
        let db = vector_db::create_vector_db(&config.vector_db).await?;

        Ok(Self::new(provider, db, config.embedding.timeout_secs)
            .await?
            .with_batch_size(config.embedding.batch_size))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedding_model(&self) -> &str {
        self.embedding.model_name()
    }

    pub fn distance(&self) -> DistanceMetric {
        self.db.distance()
    }

    /// Embed and store descriptors under their model names.
    ///
    /// Records whose rendered text, tags and embedding model are unchanged
    /// since the last upsert are not embedded again. Fails with
    /// `VectorDbError::InvalidInput` when two descriptors share a name.
    pub async fn upsert(&self, descriptors: &[ModelDescriptor]) -> Result<UpsertStats> {
        let mut seen = HashSet::new();
        for descriptor in descriptors {
            if !seen.insert(descriptor.name()) {
                return Err(VectorDbError::InvalidInput(format!(
                    "model '{}' appears more than once in the batch",
                    descriptor.name()
                ))
                .into());
            }
        }
        if descriptors.is_empty() {
            return Ok(UpsertStats::default());
        }

        let ids: Vec<String> = descriptors.iter().map(|d| d.name().to_string()).collect();
        let existing: HashMap<String, String> = self
            .db
            .get(Some(ids.as_slice()))
            .await?
            .into_iter()
            .map(|m| (m.id, m.content_hash))
            .collect();

        let mut pending = Vec::new();
        let mut stats = UpsertStats::default();
        for descriptor in descriptors {
            let document = descriptor.render_as_text();
            let hash = self.content_hash(&document, descriptor.tags());
            if existing.get(descriptor.name()) == Some(&hash) {
                stats.unchanged += 1;
                continue;
            }
            pending.push((descriptor, document, hash));
        }

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, doc, _)| doc.clone()).collect();
            let embeddings = self.embed(texts).await?;

            let records = batch
                .iter()
                .zip(embeddings)
                .map(|((descriptor, document, hash), embedding)| VectorRecord {
                    id: descriptor.name().to_string(),
                    document: document.clone(),
                    metadata: RecordMetadata {
                        tags: descriptor.tags().to_vec(),
                    },
                    content_hash: hash.clone(),
                    embedding,
                })
                .collect();
            stats.written += self.db.upsert(records).await?;
        }

        tracing::info!(
            "Upserted {} models ({} unchanged)",
            stats.written,
            stats.unchanged
        );
        Ok(stats)
    }

    /// Upsert raw documentation records.
    ///
    /// Every record is validated before anything is written; a record without
    /// a usable name fails the whole call with `VectorDbError::InvalidInput`.
    pub async fn upsert_documents(&self, documents: &[ModelDocumentation]) -> Result<UpsertStats> {
        let descriptors = documents
            .iter()
            .enumerate()
            .map(|(position, doc)| {
                ModelDescriptor::new(doc).map_err(|e| {
                    VectorDbError::InvalidInput(format!("record {}: {}", position, e))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.upsert(&descriptors).await
    }

    /// The `k` stored models nearest to `text`, closest first
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RankedResult>> {
        if text.trim().is_empty() {
            return Err(VectorDbError::InvalidQuery("query text is empty".to_string()).into());
        }
        if k == 0 {
            return Err(
                VectorDbError::InvalidQuery("result count must be at least 1".to_string()).into(),
            );
        }

        let mut vectors = self.embed(vec![text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbeddingError::GenerationFailed("no query embedding".to_string()))?;

        let results = self.db.search(vector, k).await?;
        tracing::debug!("Query returned {} models", results.len());
        Ok(results)
    }

    /// All stored records, or only `ids`
    pub async fn get(&self, ids: Option<&[String]>) -> Result<Vec<IndexedModel>> {
        self.db.get(ids).await
    }

    /// Delete every record; the collection stays usable
    pub async fn reset(&self) -> Result<()> {
        self.db.reset().await
    }

    pub async fn count(&self) -> Result<usize> {
        self.db.count().await
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let provider = self.embedding.clone();
        let embed_future = tokio::task::spawn_blocking(move || provider.embed_batch(texts));

        let embeddings =
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), embed_future).await
            {
                Ok(Ok(result)) => result?,
                Ok(Err(e)) => anyhow::bail!("Embedding task panicked: {}", e),
                Err(_) => return Err(EmbeddingError::Timeout(self.timeout_secs).into()),
            };

        if embeddings.len() != expected {
            return Err(EmbeddingError::GenerationFailed(format!(
                "expected {} embeddings, got {}",
                expected,
                embeddings.len()
            ))
            .into());
        }
        let dimension = self.embedding.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }
            .into());
        }
        Ok(embeddings)
    }

    fn content_hash(&self, document: &str, tags: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.embedding.model_name().as_bytes());
        hasher.update([0]);
        hasher.update(document.as_bytes());
        for tag in tags {
            hasher.update([0]);
            hasher.update(tag.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
