/// Centralized error types for dbt-rag using thiserror
///
/// Each component owns a small error enum; `DocsRagError` wraps them so callers
/// can match on the exact failure without string inspection.
use thiserror::Error;

/// Convenience alias used by the library components
pub type Result<T> = std::result::Result<T, DocsRagError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum DocsRagError {
    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Directory store error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while reading a dbt project from disk
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("No dbt project found: {0}")]
    ProjectNotFound(String),

    #[error("Failed to parse project manifest '{file}': {reason}")]
    ManifestParseFailed { file: String, reason: String },

    #[error("Failed to parse metadata file '{file}': {reason}")]
    SchemaParseFailed { file: String, reason: String },

    #[error("Failed to read file '{file}': {reason}")]
    FileReadFailed { file: String, reason: String },

    #[error("Model '{name}' is defined by both '{first}' and '{second}'")]
    DuplicateModel {
        name: String,
        first: String,
        second: String,
    },

    #[error("Failed to walk model path: {0}")]
    WalkFailed(String),
}

/// Errors related to model descriptors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

/// Errors related to the persisted model directory
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Model '{0}' not found in directory")]
    ModelNotFound(String),

    #[error("Failed to load directory from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save directory to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to lock directory file '{path}': {reason}")]
    LockFailed { path: String, reason: String },

    #[error("Directory lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to vector database operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to initialize vector database: {0}")]
    InitializationFailed(String),

    #[error("Failed to connect to vector database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Failed to store embeddings: {0}")]
    StoreFailed(String),

    #[error("Failed to search embeddings: {0}")]
    SearchFailed(String),

    #[error("Failed to delete embeddings: {0}")]
    DeleteFailed(String),

    #[error("Failed to reset collection: {0}")]
    ResetFailed(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors related to the chat completion boundary
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("No completion provider configured")]
    NotConfigured,

    #[error("Completion request failed: {0}")]
    RequestFailed(String),

    #[error("Completion request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Could not parse completion response: {0}")]
    InvalidResponse(String),

    #[error("Documentation generation was cancelled")]
    Cancelled,

    #[error("Model '{name}' already has documentation at '{path}'")]
    DocumentationExists { name: String, path: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<anyhow::Error> for DocsRagError {
    fn from(err: anyhow::Error) -> Self {
        DocsRagError::Other(format!("{:#}", err))
    }
}
