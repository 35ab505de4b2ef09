use crate::error::VectorDbError;
use crate::types::{IndexedModel, RankedResult};
use crate::vector_db::{DistanceMetric, VectorDatabase, VectorRecord};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Brute-force vector store kept in memory.
///
/// With a persistence directory every mutation is written to
/// `{dir}/{collection}.json` before it returns, and the file is read back on
/// construction.
pub struct MemoryVectorDB {
    records: RwLock<BTreeMap<String, VectorRecord>>,
    file: Option<PathBuf>,
    dimension: AtomicUsize,
    distance: DistanceMetric,
}

impl MemoryVectorDB {
    /// Volatile store, nothing touches disk
    pub fn new(distance: DistanceMetric) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            file: None,
            dimension: AtomicUsize::new(0),
            distance,
        }
    }

    /// Store persisted under `dir`, loading any existing collection file
    pub fn persistent(
        dir: impl AsRef<Path>,
        collection_name: &str,
        distance: DistanceMetric,
    ) -> Result<Self> {
        let file = dir.as_ref().join(format!("{}.json", collection_name));
        let records = if file.exists() {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let list: Vec<VectorRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            list.into_iter()
                .map(|record| (record.id.clone(), record))
                .collect()
        } else {
            BTreeMap::new()
        };

        let dimension = records
            .values()
            .next()
            .map(|r: &VectorRecord| r.embedding.len())
            .unwrap_or(0);
        tracing::info!(
            "Opened memory vector store at {} ({} records)",
            file.display(),
            records.len()
        );

        Ok(Self {
            records: RwLock::new(records),
            file: Some(file),
            dimension: AtomicUsize::new(dimension),
            distance,
        })
    }

    fn save(&self, records: &BTreeMap<String, VectorRecord>) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let list: Vec<&VectorRecord> = records.values().collect();
        let json = serde_json::to_string(&list).context("Failed to serialize records")?;
        let tmp = file.with_extension("json.tmp");
        std::fs::write(&tmp, json).context("Failed to write records file")?;
        std::fs::rename(&tmp, file).context("Failed to replace records file")?;
        Ok(())
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        let expected = self.dimension.load(Ordering::Relaxed);
        if expected != 0 && expected != len {
            return Err(VectorDbError::InvalidInput(format!(
                "vector has dimension {}, collection expects {}",
                len, expected
            ))
            .into());
        }
        Ok(())
    }
}

fn lock_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("Failed to acquire records lock: {}", e)
}

#[async_trait::async_trait]
impl VectorDatabase for MemoryVectorDB {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        let current = self.dimension.load(Ordering::Relaxed);
        if current != 0 && current != dimension {
            return Err(VectorDbError::InitializationFailed(format!(
                "collection has dimension {}, embedding model produces {}",
                current, dimension
            ))
            .into());
        }
        self.dimension.store(dimension, Ordering::Relaxed);
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        for record in &records {
            self.check_dimension(record.embedding.len())?;
        }

        let mut stored = self.records.write().map_err(lock_error)?;
        let mut next = stored.clone();
        let count = records.len();
        for record in records {
            next.insert(record.id.clone(), record);
        }
        self.save(&next)?;
        *stored = next;

        tracing::debug!("Upserted {} records into memory store", count);
        Ok(count)
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<RankedResult>> {
        self.check_dimension(query_vector.len())?;
        let stored = self.records.read().map_err(lock_error)?;

        let mut results: Vec<RankedResult> = stored
            .values()
            .map(|record| RankedResult {
                id: record.id.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
                distance: self.distance.compute(&query_vector, &record.embedding),
            })
            .collect();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        results.truncate(limit);
        Ok(results)
    }

    async fn get(&self, ids: Option<&[String]>) -> Result<Vec<IndexedModel>> {
        let stored = self.records.read().map_err(lock_error)?;
        Ok(match ids {
            None => stored.values().map(VectorRecord::to_indexed).collect(),
            Some(ids) => ids
                .iter()
                .filter_map(|id| stored.get(id))
                .map(VectorRecord::to_indexed)
                .collect(),
        })
    }

    async fn reset(&self) -> Result<()> {
        let mut stored = self.records.write().map_err(lock_error)?;
        let empty = BTreeMap::new();
        self.save(&empty)?;
        *stored = empty;
        tracing::info!("Reset memory vector store");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(lock_error)?.len())
    }

    fn distance(&self) -> DistanceMetric {
        self.distance
    }
}
