/// Configuration system for dbt-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, DocsRagError};
use crate::types::MergePolicy;
use crate::vector_db::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// dbt project parsing configuration
    #[serde(default)]
    pub project: ProjectConfig,

    /// Persisted model directory configuration
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chat completion configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Credentials for the hosted OpenAI API
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// dbt project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root directory of the dbt project (contains dbt_project.yml)
    #[serde(default = "default_project_root")]
    pub root: PathBuf,

    /// What to do when two files claim the same model name
    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Drop directory entries that a full parse no longer discovers
    #[serde(default = "default_prune_on_parse")]
    pub prune_on_parse: bool,
}

/// Model directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// JSON file holding the model directory
    #[serde(default = "default_directory_path")]
    pub path: PathBuf,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Database backend: "lancedb" or "memory"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Data directory for the backend
    #[serde(default = "default_vector_db_path")]
    pub path: PathBuf,

    /// Collection name for vector storage
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Distance function used for ranking
    #[serde(default)]
    pub distance: DistanceMetric,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: "fastembed" (local) or "openai" (hosted)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name (e.g., "all-MiniLM-L6-v2", "text-embedding-3-large")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for embedding generation
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Chat completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Chat model name
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout in seconds for a single completion request
    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,

    /// Retries on rate limiting and server errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of closest models returned (k)
    #[serde(default = "default_result_limit")]
    pub limit: usize,
}

/// OpenAI credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiConfig {
    /// API key; read from the environment and never written back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

// Default value functions
fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_prune_on_parse() -> bool {
    true
}

fn default_directory_path() -> PathBuf {
    crate::paths::PlatformPaths::default_directory_path()
}

fn default_db_backend() -> String {
    "lancedb".to_string()
}

fn default_vector_db_path() -> PathBuf {
    crate::paths::PlatformPaths::default_vector_db_path()
}

fn default_collection_name() -> String {
    "dbt_models".to_string()
}

fn default_embedding_provider() -> String {
    "fastembed".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_chat_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_result_limit() -> usize {
    3
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
            merge_policy: MergePolicy::default(),
            prune_on_parse: default_prune_on_parse(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: default_directory_path(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            path: default_vector_db_path(),
            collection_name: default_collection_name(),
            distance: DistanceMetric::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model_name: default_model_name(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_chat_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_result_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, DocsRagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load_or_default() -> Result<Self, DocsRagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), DocsRagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), DocsRagError> {
        if self.vector_db.backend != "lancedb" && self.vector_db.backend != "memory" {
            return Err(ConfigError::InvalidValue {
                key: "vector_db.backend".to_string(),
                reason: format!(
                    "must be 'lancedb' or 'memory', got '{}'",
                    self.vector_db.backend
                ),
            }
            .into());
        }

        if self.vector_db.collection_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "vector_db.collection_name".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.embedding.provider != "fastembed" && self.embedding.provider != "openai" {
            return Err(ConfigError::InvalidValue {
                key: "embedding.provider".to_string(),
                reason: format!(
                    "must be 'fastembed' or 'openai', got '{}'",
                    self.embedding.provider
                ),
            }
            .into());
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chat.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chat.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.search.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.limit".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("DBT_RAG_PROJECT_ROOT") {
            self.project.root = PathBuf::from(root);
        }

        if let Ok(path) = std::env::var("DBT_RAG_DIRECTORY_PATH") {
            self.directory.path = PathBuf::from(path);
        }

        if let Ok(backend) = std::env::var("DBT_RAG_DB_BACKEND") {
            self.vector_db.backend = backend;
        }

        if let Ok(path) = std::env::var("DBT_RAG_DB_PATH") {
            self.vector_db.path = PathBuf::from(path);
        }

        if let Ok(provider) = std::env::var("DBT_RAG_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("DBT_RAG_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(model) = std::env::var("DBT_RAG_CHAT_MODEL") {
            self.chat.model = model;
        }

        if let Ok(limit) = std::env::var("DBT_RAG_SEARCH_LIMIT")
            && let Ok(limit) = limit.parse()
        {
            self.search.limit = limit;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.trim().is_empty()
        {
            self.openai.api_key = Some(key);
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, DocsRagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
