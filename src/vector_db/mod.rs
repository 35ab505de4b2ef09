// LanceDB is the default embedded vector database
pub mod lance_client;
pub use lance_client::LanceVectorDB;

// Brute-force store, optionally persisted as one JSON file per collection
pub mod memory_client;
pub use memory_client::MemoryVectorDB;

use crate::config::VectorDbConfig;
use crate::error::VectorDbError;
use crate::types::{IndexedModel, RankedResult, RecordMetadata};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Distance function used for nearest-neighbour search.
///
/// Smaller is always closer. `L2` is the squared euclidean distance, the
/// same quantity LanceDB reports for its `l2` metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    L2,
    Cosine,
    Dot,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
            DistanceMetric::Dot => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }

    pub(crate) fn to_lance(self) -> lancedb::DistanceType {
        match self {
            DistanceMetric::L2 => lancedb::DistanceType::L2,
            DistanceMetric::Cosine => lancedb::DistanceType::Cosine,
            DistanceMetric::Dot => lancedb::DistanceType::Dot,
        }
    }
}

/// One embedded model record, keyed by model name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub document: String,
    pub metadata: RecordMetadata,
    pub content_hash: String,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub(crate) fn to_indexed(&self) -> IndexedModel {
        IndexedModel {
            id: self.id.clone(),
            document: self.document.clone(),
            metadata: self.metadata.clone(),
            content_hash: self.content_hash.clone(),
        }
    }
}

/// Trait for vector database operations
#[async_trait::async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Initialize the database and create the collection if needed
    async fn initialize(&self, dimension: usize) -> Result<()>;

    /// Insert records, replacing any existing record with the same id
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// The `limit` nearest records, closest first
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<RankedResult>>;

    /// All records, or only the requested ids
    async fn get(&self, ids: Option<&[String]>) -> Result<Vec<IndexedModel>>;

    /// Delete every record and recreate an empty collection
    async fn reset(&self) -> Result<()>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    fn distance(&self) -> DistanceMetric;
}

/// Open the backend selected by `vector_db.backend`
pub async fn create_vector_db(config: &VectorDbConfig) -> Result<Arc<dyn VectorDatabase>> {
    match config.backend.as_str() {
        "lancedb" => Ok(Arc::new(
            LanceVectorDB::with_config(
                &config.path.to_string_lossy(),
                &config.collection_name,
                config.distance,
            )
            .await?,
        )),
        "memory" => Ok(Arc::new(MemoryVectorDB::persistent(
            &config.path,
            &config.collection_name,
            config.distance,
        )?)),
        other => Err(VectorDbError::InitializationFailed(format!(
            "unknown vector database backend '{}'",
            other
        ))
        .into()),
    }
}
