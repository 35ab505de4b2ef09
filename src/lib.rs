//! # dbt-rag - Retrieval and Documentation for dbt Projects
//!
//! Parses a dbt project into a persisted model directory, embeds model
//! documentation into a vector index, answers questions about the project
//! with retrieval-augmented chat, and generates documentation for models that
//! have none.
//!
//! ## Overview
//!
//! A dbt project is a tree of SQL models that reference each other with
//! `{{ ref('name') }}`, plus YAML metadata files describing those models.
//! dbt-rag joins the two halves by model name, resolves every model's
//! transitive dependencies, and keeps the result in a JSON directory file.
//! Documented models are rendered to text and embedded so the closest models
//! can be retrieved for a question and handed to a chat model as context.
//!
//! ## Key Features
//!
//! - **Project Directory**: SQL and metadata files joined by name, with refs, deps and sources
//! - **Semantic Search**: FastEmbed (all-MiniLM-L6-v2) locally or the OpenAI embeddings API
//! - **Vector Storage**: LanceDB (embedded, default) or a JSON-backed in-memory store
//! - **Incremental Loading**: Unchanged model documents are never re-embedded
//! - **Chat Sessions**: Each model's documentation enters the conversation once
//! - **Documentation Generation**: Dependencies are interpreted first, results saved as they arrive
//!
//! ## Architecture
//!
//! ```text
//!  dbt project ──► DbtProject ──► DirectoryStore (JSON)
//!                                      │
//!                              ModelDescriptor
//!                                      │
//!                    EmbeddingProvider ─┴─► ModelVectorIndex ──► LanceDB / memory
//!                                                │
//!                     CompletionProvider ◄── ChatSession / documentation
//! ```
//!
//! ## Modules
//!
//! - [`client`]: [`DocsClient`] and [`ChatSession`], the library entry points
//! - [`project`]: Manifest loading, file discovery, ref extraction and directory building
//! - [`store`]: The persisted model directory
//! - [`model`]: Validated model descriptors and their text rendering
//! - [`embedding`]: Embedding providers (FastEmbed, OpenAI)
//! - [`vector_db`]: Vector database abstraction (LanceDB and in-memory)
//! - [`vector_index`]: Model documents in the vector database
//! - [`completion`]: Chat completion providers
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Directory, retrieval and chat types
//! - [`error`]: Error types and result aliases
//!
//! ## Usage Example
//!
//! ```no_run
//! use dbt_rag::{Config, DocsClient, ModelFilter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::new()?;
//!     config.project.root = "/path/to/dbt_project".into();
//!
//!     let client = DocsClient::with_config(config).await?;
//!     client.parse_project().await?;
//!     client.load_models(&ModelFilter::all()).await?;
//!
//!     for result in client.query_models("daily revenue", None).await? {
//!         println!("{} ({:.3})", result.id, result.distance);
//!     }
//!     Ok(())
//! }
//! ```

/// Library client: parsing, loading, querying, chat and documentation
pub mod client;

/// Chat completion providers
pub mod completion;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed or the OpenAI API
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Built-in system instructions for the language model
pub mod instructions;

/// Model descriptors rendered for embedding
pub mod model;

/// Platform-specific data and configuration locations
pub mod paths;

/// dbt project parsing
pub mod project;

/// Persisted model directory
pub mod store;

/// Directory, retrieval and chat types
pub mod types;

/// Vector database abstraction supporting LanceDB and an in-memory store
pub mod vector_db;

/// Model documents in the vector database
pub mod vector_index;

mod http;

/// Offline embedding and completion providers for tests
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{ChatSession, DocsClient};
pub use config::Config;
pub use error::{DocsRagError, Result};
pub use model::ModelDescriptor;
pub use types::{GenerateOptions, ModelDirectoryEntry, ModelDocumentation, ModelFilter};
pub use vector_db::DistanceMetric;
pub use vector_index::ModelVectorIndex;
