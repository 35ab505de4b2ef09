use super::*;
use crate::error::VectorDbError;
use tempfile::TempDir;

fn record(id: &str, embedding: Vec<f32>, tags: &[&str]) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        document: format!("The table {} does not have a description.", id),
        metadata: RecordMetadata {
            tags: tags.iter().map(|t| t.to_string()).collect(),
        },
        content_hash: format!("hash-{}", id),
        embedding,
    }
}

async fn open(temp_dir: &TempDir) -> LanceVectorDB {
    let db_path = temp_dir
        .path()
        .join("lancedb")
        .to_string_lossy()
        .to_string();
    let db = LanceVectorDB::with_path(&db_path).await.unwrap();
    db.initialize(3).await.unwrap();
    db
}

#[tokio::test]
async fn test_new_creates_instance() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("lancedb")
        .to_string_lossy()
        .to_string();

    let db = LanceVectorDB::with_path(&db_path).await.unwrap();
    assert_eq!(db.table_name, "dbt_models");
    assert_eq!(db.db_path, db_path);
    assert_eq!(db.distance(), DistanceMetric::L2);
}

#[tokio::test]
async fn test_default_path() {
    let path = LanceVectorDB::default_lancedb_path();
    assert!(path.contains("dbt-rag"));
}

#[tokio::test]
async fn test_initialize_creates_table() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    let table_names = db.connection.table_names().execute().await.unwrap();
    assert!(table_names.contains(&"dbt_models".to_string()));
    assert_eq!(db.count().await.unwrap(), 0);

    // Second call is a no-op
    db.initialize(3).await.unwrap();
}

#[tokio::test]
async fn test_initialize_rejects_different_dimension() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.upsert(vec![record("orders", vec![1.0, 0.0, 0.0], &[])])
        .await
        .unwrap();

    let err = db.initialize(8).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VectorDbError>(),
        Some(VectorDbError::InitializationFailed(_))
    ));

    // Reopening with the original dimension still works and keeps the data
    let reopened = LanceVectorDB::with_path(&db.db_path).await.unwrap();
    reopened.initialize(3).await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_upsert_with_wrong_dimension_is_store_failure() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    let err = db
        .upsert(vec![record("orders", vec![1.0, 0.0, 0.0, 0.0, 0.0], &[])])
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VectorDbError>(),
        Some(VectorDbError::StoreFailed(_))
    ));
    assert_eq!(db.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_with_wrong_dimension_is_search_failure() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.upsert(vec![record("orders", vec![1.0, 0.0, 0.0], &[])])
        .await
        .unwrap();

    let err = db.search(vec![1.0, 0.0], 1).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VectorDbError>(),
        Some(VectorDbError::SearchFailed(_))
    ));
}

#[tokio::test]
async fn test_upsert_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    let stored = db
        .upsert(vec![
            record("orders", vec![1.0, 0.0, 0.0], &["finance"]),
            record("customers", vec![0.0, 1.0, 0.0], &[]),
        ])
        .await
        .unwrap();
    assert_eq!(stored, 2);

    let all = db.get(None).await.unwrap();
    let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["customers", "orders"]);
    assert_eq!(all[1].metadata.tags, vec!["finance".to_string()]);
    assert_eq!(all[1].content_hash, "hash-orders");
}

#[tokio::test]
async fn test_upsert_overwrites_same_id() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    db.upsert(vec![record("orders", vec![1.0, 0.0, 0.0], &[])])
        .await
        .unwrap();
    let mut replacement = record("orders", vec![0.0, 0.0, 1.0], &[]);
    replacement.document = "The table orders is described as follows: new".to_string();
    db.upsert(vec![replacement]).await.unwrap();

    assert_eq!(db.count().await.unwrap(), 1);
    let all = db.get(None).await.unwrap();
    assert_eq!(
        all[0].document,
        "The table orders is described as follows: new"
    );
}

#[tokio::test]
async fn test_get_by_ids_keeps_requested_order() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.upsert(vec![
        record("a", vec![1.0, 0.0, 0.0], &[]),
        record("b", vec![0.0, 1.0, 0.0], &[]),
        record("o'brien", vec![0.0, 0.0, 1.0], &[]),
    ])
    .await
    .unwrap();

    let ids = vec!["o'brien".to_string(), "missing".to_string(), "a".to_string()];
    let found = db.get(Some(ids.as_slice())).await.unwrap();
    let found_ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(found_ids, vec!["o'brien", "a"]);

    assert!(db.get(Some(&[][..])).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_returns_nearest_first() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.upsert(vec![
        record("near", vec![1.0, 0.0, 0.0], &[]),
        record("middle", vec![0.0, 1.0, 0.0], &[]),
        record("far", vec![-5.0, -5.0, 0.0], &[]),
    ])
    .await
    .unwrap();

    let results = db.search(vec![1.0, 0.1, 0.0], 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "near");
    assert_eq!(results[1].id, "middle");
    assert!(results[0].distance >= 0.0);
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn test_reset_clears_and_recreates() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.upsert(vec![record("a", vec![1.0, 0.0, 0.0], &[])])
        .await
        .unwrap();

    db.reset().await.unwrap();
    assert_eq!(db.count().await.unwrap(), 0);
    assert!(db.get(None).await.unwrap().is_empty());

    // Collection is usable again
    db.upsert(vec![record("b", vec![0.0, 1.0, 0.0], &[])])
        .await
        .unwrap();
    assert_eq!(db.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_reset_on_empty_database() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    db.reset().await.unwrap();
    db.reset().await.unwrap();
    assert_eq!(db.count().await.unwrap(), 0);
}

#[test]
fn test_id_filter_escapes_quotes() {
    let filter = LanceVectorDB::id_filter(&["a".to_string(), "it's".to_string()]);
    assert_eq!(filter, "id IN ('a', 'it''s')");
}

#[test]
fn test_create_schema() {
    let schema = LanceVectorDB::create_schema(384);
    assert_eq!(schema.fields().len(), 5);
    assert!(schema.field_with_name("vector").is_ok());
    assert!(schema.field_with_name("content_hash").is_ok());
}
