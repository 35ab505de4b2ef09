//! Shared setup for the integration tests
#![allow(dead_code)]

use anyhow::Result;
use dbt_rag::completion::CompletionProvider;
use dbt_rag::store::DirectoryStore;
use dbt_rag::test_support::KeywordEmbedder;
use dbt_rag::types::PromptMessage;
use dbt_rag::vector_db::{DistanceMetric, MemoryVectorDB};
use dbt_rag::vector_index::ModelVectorIndex;
use dbt_rag::{Config, DocsClient};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/valid_project")
}

/// Copy the fixture project into a fresh temp dir so tests can write to it
pub fn copy_fixture() -> Result<TempDir> {
    let dir = TempDir::new()?;
    copy_dir(&fixture_path(), dir.path())?;
    Ok(dir)
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Completion provider that answers every prompt with a canned reply
pub struct CannedCompletion {
    reply: Box<dyn Fn(&[PromptMessage]) -> String + Send + Sync>,
    prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl CannedCompletion {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&[PromptMessage]) -> String + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<PromptMessage>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionProvider for CannedCompletion {
    fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }
        Ok((self.reply)(messages))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

pub struct TestClient {
    pub client: DocsClient,
    pub project: TempDir,
    pub data: TempDir,
}

/// A client over a copy of the fixture project with offline collaborators
pub async fn test_client(completion: Option<Arc<dyn CompletionProvider>>) -> Result<TestClient> {
    let project = copy_fixture()?;
    let data = TempDir::new()?;

    let mut config = Config::default();
    config.project.root = project.path().to_path_buf();
    config.directory.path = data.path().join("directory.json");
    config.vector_db.backend = "memory".to_string();
    config.vector_db.path = data.path().join("vectors");

    let store = Arc::new(DirectoryStore::open(&config.directory.path)?);
    let db = Arc::new(MemoryVectorDB::persistent(
        &config.vector_db.path,
        &config.vector_db.collection_name,
        DistanceMetric::L2,
    )?);
    let embedder = KeywordEmbedder::with_dimension(128).with_min_word_len(3);
    let index = ModelVectorIndex::new(Arc::new(embedder), db, 5).await?;

    let client = DocsClient::with_components(config, store, Arc::new(index), completion);
    Ok(TestClient {
        client,
        project,
        data,
    })
}
