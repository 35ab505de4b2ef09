//! LanceDB vector database client

use crate::error::VectorDbError;
use crate::types::{IndexedModel, RankedResult, RecordMetadata};
use crate::vector_db::{DistanceMetric, VectorDatabase, VectorRecord};
use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// LanceDB vector database implementation (embedded, no server required)
pub struct LanceVectorDB {
    connection: Connection,
    table_name: String,
    db_path: String,
    distance: DistanceMetric,
    /// Known once the collection is initialized; used to recreate it on reset
    dimension: AtomicUsize,
}

impl LanceVectorDB {
    /// Create a new LanceDB instance with default path
    pub async fn new() -> Result<Self> {
        let db_path = Self::default_lancedb_path();
        Self::with_path(&db_path).await
    }

    /// Create a new LanceDB instance with custom path
    pub async fn with_path(db_path: &str) -> Result<Self> {
        Self::with_config(db_path, "dbt_models", DistanceMetric::default()).await
    }

    pub async fn with_config(
        db_path: &str,
        table_name: &str,
        distance: DistanceMetric,
    ) -> Result<Self> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(format!("{}: {}", db_path, e)))?;

        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            db_path: db_path.to_string(),
            distance,
            dimension: AtomicUsize::new(0),
        })
    }

    /// Get default database path
    pub fn default_lancedb_path() -> String {
        crate::paths::PlatformPaths::default_vector_db_path()
            .to_string_lossy()
            .to_string()
    }

    /// Create schema for the models table
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
        ]))
    }

    async fn get_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open table")
    }

    /// Vector dimension of the existing table's `vector` column
    async fn stored_dimension(&self, table: &Table) -> Result<Option<usize>> {
        let schema = table.schema().await.context("Failed to read table schema")?;
        Ok(schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            }))
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(table_names.contains(&self.table_name))
    }

    /// Convert records to a RecordBatch
    fn create_record_batch(records: Vec<VectorRecord>, schema: Arc<Schema>) -> Result<RecordBatch> {
        let dimension = records[0].embedding.len();

        let id_array = StringArray::from(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());
        let document_array = StringArray::from(
            records
                .iter()
                .map(|r| r.document.as_str())
                .collect::<Vec<_>>(),
        );
        let tags_array = StringArray::from(
            records
                .iter()
                .map(|r| serde_json::to_string(&r.metadata.tags))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to serialize tags")?,
        );
        let hash_array = StringArray::from(
            records
                .iter()
                .map(|r| r.content_hash.as_str())
                .collect::<Vec<_>>(),
        );

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .into_iter()
                .map(|r| Some(r.embedding.into_iter().map(Some))),
            dimension as i32,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(id_array),
                Arc::new(document_array),
                Arc::new(tags_array),
                Arc::new(hash_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// SQL predicate matching any of `ids`
    fn id_filter(ids: &[String]) -> String {
        let quoted: Vec<String> = ids
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect();
        format!("id IN ({})", quoted.join(", "))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .with_context(|| format!("Missing {} column", name))?
            .as_any()
            .downcast_ref::<StringArray>()
            .with_context(|| format!("Invalid {} type", name))
    }

    fn parse_tags(raw: &str) -> RecordMetadata {
        RecordMetadata {
            tags: serde_json::from_str(raw).unwrap_or_default(),
        }
    }

    fn collect_indexed(batches: &[RecordBatch]) -> Result<Vec<IndexedModel>> {
        let mut models = Vec::new();
        for batch in batches {
            let ids = Self::string_column(batch, "id")?;
            let documents = Self::string_column(batch, "document")?;
            let tags = Self::string_column(batch, "tags")?;
            let hashes = Self::string_column(batch, "content_hash")?;

            for i in 0..batch.num_rows() {
                models.push(IndexedModel {
                    id: ids.value(i).to_string(),
                    document: documents.value(i).to_string(),
                    metadata: Self::parse_tags(tags.value(i)),
                    content_hash: hashes.value(i).to_string(),
                });
            }
        }
        Ok(models)
    }
}

#[async_trait::async_trait]
impl VectorDatabase for LanceVectorDB {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        tracing::info!(
            "Initializing LanceDB with dimension {} at {}",
            dimension,
            self.db_path
        );
        if self.table_exists().await? {
            let table = self.get_table().await?;
            if let Some(stored) = self.stored_dimension(&table).await?
                && stored != dimension
            {
                return Err(VectorDbError::InitializationFailed(format!(
                    "table '{}' has dimension {}, embedding model produces {}",
                    self.table_name, stored, dimension
                ))
                .into());
            }
            self.dimension.store(dimension, Ordering::Relaxed);
            tracing::info!("Table '{}' already exists", self.table_name);
            return Ok(());
        }
        self.dimension.store(dimension, Ordering::Relaxed);

        let schema = Self::create_schema(dimension);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches =
            RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema.clone());

        self.connection
            .create_table(&self.table_name, Box::new(batches))
            .execute()
            .await
            .map_err(|e| VectorDbError::CollectionCreationFailed {
                collection: self.table_name.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Created table '{}'", self.table_name);
        Ok(())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let dimension = records[0].embedding.len();
        let schema = Self::create_schema(dimension);
        let table = self.get_table().await?;

        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        table
            .delete(&Self::id_filter(&ids))
            .await
            .map_err(|e| VectorDbError::DeleteFailed(e.to_string()))?;

        let batch = Self::create_record_batch(records, schema.clone())?;
        let count = batch.num_rows();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| VectorDbError::StoreFailed(e.to_string()))?;

        tracing::info!("Upserted {} model records", count);
        Ok(count)
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<RankedResult>> {
        let table = self.get_table().await?;

        let stream = table
            .vector_search(query_vector)
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?
            .distance_type(self.distance.to_lance())
            .limit(limit)
            .execute()
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?;

        let results: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?;

        let mut ranked = Vec::new();
        for batch in &results {
            let ids = Self::string_column(batch, "id")?;
            let documents = Self::string_column(batch, "document")?;
            let tags = Self::string_column(batch, "tags")?;
            let distance_array = batch
                .column_by_name("_distance")
                .context("Missing _distance column")?
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Invalid _distance type")?;

            for i in 0..batch.num_rows() {
                ranked.push(RankedResult {
                    id: ids.value(i).to_string(),
                    document: documents.value(i).to_string(),
                    metadata: Self::parse_tags(tags.value(i)),
                    distance: if distance_array.is_null(i) {
                        f32::MAX
                    } else {
                        distance_array.value(i)
                    },
                });
            }
        }

        ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn get(&self, ids: Option<&[String]>) -> Result<Vec<IndexedModel>> {
        let table = self.get_table().await?;

        let query = table.query();
        let stream = match ids {
            Some([]) => return Ok(Vec::new()),
            Some(ids) => query
                .only_if(Self::id_filter(ids))
                .execute()
                .await
                .context("Failed to query records")?,
            None => query.execute().await.context("Failed to query records")?,
        };

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect records")?;
        let mut models = Self::collect_indexed(&batches)?;

        match ids {
            Some(ids) => {
                // Requested order
                let mut ordered = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(pos) = models.iter().position(|m| &m.id == id) {
                        ordered.push(models.swap_remove(pos));
                    }
                }
                Ok(ordered)
            }
            None => {
                models.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(models)
            }
        }
    }

    async fn reset(&self) -> Result<()> {
        if self.table_exists().await? {
            self.connection
                .drop_table(&self.table_name, &[])
                .await
                .map_err(|e| VectorDbError::ResetFailed(e.to_string()))?;
        }

        let dimension = self.dimension.load(Ordering::Relaxed);
        if dimension > 0 {
            self.initialize(dimension).await?;
        }

        tracing::info!("Reset table '{}'", self.table_name);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }
        let table = self.get_table().await?;
        table
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }

    fn distance(&self) -> DistanceMetric {
        self.distance
    }
}

#[cfg(test)]
mod tests;
