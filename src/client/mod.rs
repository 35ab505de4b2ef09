//! Core library client for dbt-rag
//!
//! [`DocsClient`] ties the pieces together: it parses the dbt project into the
//! directory store, loads documented models into the vector index, answers
//! questions through a [`ChatSession`] and generates model documentation.

mod chat;
mod documentation;

pub use chat::ChatSession;

use crate::completion::{self, CompletionProvider};
use crate::config::Config;
use crate::error::CompletionError;
use crate::model::ModelDescriptor;
use crate::project::DbtProject;
use crate::store::DirectoryStore;
use crate::types::*;
use crate::vector_index::ModelVectorIndex;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main client for parsing a dbt project and retrieving its models
///
/// # Example
///
/// ```no_run
/// use dbt_rag::{Config, DocsClient, ModelFilter};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut config = Config::default();
///     config.project.root = "/path/to/dbt_project".into();
///
///     let client = DocsClient::with_config(config).await?;
///     client.parse_project().await?;
///     client.load_models(&ModelFilter::all()).await?;
///
///     let mut session = client.chat_session();
///     let answer = session.ask("Which model holds daily revenue?").await?;
///     println!("{}", answer.answer);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DocsClient {
    pub(crate) config: Arc<Config>,
    pub(crate) store: Arc<DirectoryStore>,
    pub(crate) index: Arc<ModelVectorIndex>,
    pub(crate) completion: Option<Arc<dyn CompletionProvider>>,
}

impl DocsClient {
    /// Create a client from the configuration file and environment
    pub async fn new() -> Result<Self> {
        let config = Config::new().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    /// Create a client with custom configuration
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        tracing::info!("Initializing dbt-rag client");
        tracing::debug!("Vector DB backend: {}", config.vector_db.backend);
        tracing::debug!(
            "Embedding: {} ({})",
            config.embedding.model_name,
            config.embedding.provider
        );

        let store = DirectoryStore::open(&config.directory.path)
            .context("Failed to open model directory")?;
        let index = ModelVectorIndex::from_config(&config)
            .await
            .context("Failed to initialize vector index")?;

        let completion = match completion::create_provider(&config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::info!("Completion provider unavailable: {}", e);
                None
            }
        };

        Ok(Self::with_components(
            config,
            Arc::new(store),
            Arc::new(index),
            completion,
        ))
    }

    /// Assemble a client from already constructed parts
    pub fn with_components(
        config: Config,
        store: Arc<DirectoryStore>,
        index: Arc<ModelVectorIndex>,
        completion: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            index,
            completion,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &DirectoryStore {
        &self.store
    }

    pub fn index(&self) -> &ModelVectorIndex {
        &self.index
    }

    /// Parse the configured project and persist the resulting directory.
    ///
    /// Nothing is written when the parse fails.
    pub async fn parse_project(&self) -> Result<ParseResponse> {
        let start = Instant::now();
        let root = self.config.project.root.clone();
        let merge_policy = self.config.project.merge_policy;

        let build = tokio::task::spawn_blocking(move || {
            DbtProject::open(&root)?
                .with_merge_policy(merge_policy)
                .build()
        })
        .await
        .context("Project parse task panicked")?
        .context("Failed to parse dbt project")?;

        let directory = build.directory;
        let sql_models = directory.models.values().filter(|e| e.sql.is_some()).count();
        let documentation_only = directory
            .models
            .values()
            .filter(|e| e.kind() == EntryKind::DocumentationOnly)
            .count();
        let sources = directory.sources.len();

        self.store
            .save_directory(directory, self.config.project.prune_on_parse)
            .context("Failed to save model directory")?;
        let models = self.store.directory()?.models.len();

        tracing::info!(
            "Parsed project: {} models ({} from SQL), {} sources",
            models,
            sql_models,
            sources
        );

        Ok(ParseResponse {
            models,
            sql_models,
            documentation_only,
            sources,
            duration_ms: start.elapsed().as_millis() as u64,
            warnings: build.warnings,
        })
    }

    /// Look up one model; `None` when the name is unknown
    pub fn get_model(&self, name: &str) -> Result<Option<ModelDirectoryEntry>> {
        Ok(self.store.get(name)?)
    }

    pub fn list_models(&self, filter: &ModelFilter) -> Result<Vec<ModelDirectoryEntry>> {
        Ok(self.store.list(filter)?)
    }

    /// Load the selected models into the vector index.
    ///
    /// Each entry is described by its documentation, or by its generated
    /// interpretation when it has none. Entries with neither are skipped.
    pub async fn load_models(&self, filter: &ModelFilter) -> Result<LoadResponse> {
        let start = Instant::now();
        let entries = self.store.list(filter)?;

        let mut descriptors = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();
        for entry in &entries {
            match ModelDescriptor::from_entry(entry) {
                Some(descriptor) => descriptors.push(
                    descriptor.with_context(|| format!("Invalid documentation for {}", entry.name))?,
                ),
                None => {
                    tracing::debug!("Skipping undocumented model {}", entry.name);
                    skipped.push(entry.name.clone());
                }
            }
        }

        let stats = self
            .index
            .upsert(&descriptors)
            .await
            .context("Failed to load models into the vector index")?;
        tracing::info!(
            "Loaded {} models ({} re-embedded, {} skipped)",
            descriptors.len(),
            stats.written,
            skipped.len()
        );

        Ok(LoadResponse {
            models_loaded: descriptors.len(),
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Remove every model from the vector index
    pub async fn reset_model_index(&self) -> Result<()> {
        self.index
            .reset()
            .await
            .context("Failed to reset the vector index")
    }

    /// The models closest to `question`; `k` defaults to `search.limit`
    pub async fn query_models(&self, question: &str, k: Option<usize>) -> Result<Vec<RankedResult>> {
        let k = k.unwrap_or(self.config.search.limit);
        self.index.query(question, k).await
    }

    /// Start a question answering session with the default instructions
    pub fn chat_session(&self) -> ChatSession {
        ChatSession::new(self.clone())
    }

    /// Run one completion on a blocking thread, bounded by `chat.timeout_secs`
    pub(crate) async fn complete(&self, messages: Vec<PromptMessage>) -> Result<String> {
        let provider = self
            .completion
            .clone()
            .ok_or(CompletionError::NotConfigured)?;
        let timeout_secs = self.config.chat.timeout_secs;

        let task = tokio::task::spawn_blocking(move || provider.complete(&messages));
        match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(anyhow::anyhow!("Completion task panicked: {}", e)),
            Err(_) => Err(CompletionError::Timeout(timeout_secs).into()),
        }
    }
}
