use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Free-form YAML/JSON keys carried through untouched
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

/// How the directory builder treats two files deriving the same model name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Later file (in lexicographic path order) replaces the earlier one
    #[default]
    Overwrite,
    /// Abort the parse with `ProjectError::DuplicateModel`
    ErrorOnConflict,
}

/// A `source('<source>', '<table>')` call found in model SQL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceReference {
    pub source_name: String,
    pub table_name: String,
}

/// The SQL half of a directory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlModel {
    pub absolute_path: PathBuf,
    /// Path relative to the project root, forward slashes
    pub relative_path: String,
    pub sql_contents: String,
    /// Directly referenced models that exist in the project
    #[serde(default)]
    pub refs: BTreeSet<String>,
    /// Directly referenced names with no matching SQL file
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_refs: BTreeSet<String>,
    /// Transitive dependencies, upstream first
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceReference>,
    /// SHA-256 of `sql_contents`
    #[serde(default)]
    pub checksum: String,
}

/// A documented column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnDocumentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// The `config:` block of a documented model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A model record as written in a metadata file, or as produced by interpretation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDocumentation {
    #[serde(default, alias = "model", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnDocumentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ModelConfig>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ModelDocumentation {
    /// Tags from `config.tags`, empty when no config is present
    pub fn tags(&self) -> &[String] {
        self.config.as_ref().map(|c| c.tags.as_slice()).unwrap_or(&[])
    }
}

/// A table listed under a source declaration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceTable {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A `sources:` record from a metadata file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceDeclaration {
    #[serde(default)]
    pub name: String,
    /// Metadata file the declaration was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<SourceTable>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// What a directory entry is backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// SQL file without documentation
    Sql,
    /// Documentation without a SQL file
    DocumentationOnly,
    /// SQL file with documentation
    Documented,
    /// Neither half present (only reachable through partial updates)
    Empty,
}

/// One model in the project directory
///
/// The SQL half and the documentation half are discovered independently
/// and joined by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDirectoryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<ModelDocumentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<ModelDocumentation>,
}

impl ModelDirectoryEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> EntryKind {
        match (self.sql.is_some(), self.documentation.is_some()) {
            (true, true) => EntryKind::Documented,
            (true, false) => EntryKind::Sql,
            (false, true) => EntryKind::DocumentationOnly,
            (false, false) => EntryKind::Empty,
        }
    }

    pub fn absolute_path(&self) -> Option<&Path> {
        self.sql.as_ref().map(|s| s.absolute_path.as_path())
    }

    pub fn relative_path(&self) -> Option<&str> {
        self.sql.as_ref().map(|s| s.relative_path.as_str())
    }

    pub fn sql_contents(&self) -> Option<&str> {
        self.sql.as_ref().map(|s| s.sql_contents.as_str())
    }

    /// Directly referenced models (empty for documentation-only entries)
    pub fn refs(&self) -> impl Iterator<Item = &str> {
        self.sql.iter().flat_map(|s| s.refs.iter().map(String::as_str))
    }

    /// Transitive dependencies, upstream first
    pub fn deps(&self) -> &[String] {
        self.sql.as_ref().map(|s| s.deps.as_slice()).unwrap_or(&[])
    }

    /// Hand-written documentation, falling back to the generated interpretation
    pub fn descriptor_source(&self) -> Option<&ModelDocumentation> {
        self.documentation
            .as_ref()
            .or(self.interpretation.as_ref())
    }

    /// True if `fragment` occurs in the SQL path or the metadata file path
    pub fn matches_path(&self, fragment: &str) -> bool {
        let in_sql = self
            .absolute_path()
            .is_some_and(|p| p.to_string_lossy().contains(fragment));
        let in_yaml = self
            .yaml_path
            .as_ref()
            .is_some_and(|p| p.to_string_lossy().contains(fragment));
        in_sql || in_yaml
    }
}

/// Partial update applied by `DirectoryStore::update_field`
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub documentation: Option<ModelDocumentation>,
    pub yaml_path: Option<PathBuf>,
    pub interpretation: Option<ModelDocumentation>,
}

impl EntryUpdate {
    pub fn interpretation(interpretation: ModelDocumentation) -> Self {
        Self {
            interpretation: Some(interpretation),
            ..Default::default()
        }
    }

    pub fn with_yaml_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.yaml_path = Some(path.into());
        self
    }

    pub fn apply_to(self, entry: &mut ModelDirectoryEntry) {
        if let Some(documentation) = self.documentation {
            entry.documentation = Some(documentation);
        }
        if let Some(yaml_path) = self.yaml_path {
            entry.yaml_path = Some(yaml_path);
        }
        if let Some(interpretation) = self.interpretation {
            entry.interpretation = Some(interpretation);
        }
    }
}

/// The full model directory of a project
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectDirectory {
    #[serde(default)]
    pub models: BTreeMap<String, ModelDirectoryEntry>,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceDeclaration>,
}

impl ProjectDirectory {
    /// Select entries matching `filter`.
    ///
    /// Explicit names come first in the order given (unknown names are
    /// skipped), then entries matching any included path fragment in
    /// directory order. Exclusions are applied last. An empty filter
    /// selects everything.
    pub fn select(&self, filter: &ModelFilter) -> Vec<&ModelDirectoryEntry> {
        let mut selected: Vec<&ModelDirectoryEntry> = Vec::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        if filter.names.is_none() && filter.included_paths.is_none() {
            selected.extend(self.models.values());
        } else {
            for name in filter.names.iter().flatten() {
                if let Some(entry) = self.models.get(name)
                    && seen.insert(entry.name.as_str())
                {
                    selected.push(entry);
                }
            }
            for fragment in filter.included_paths.iter().flatten() {
                for entry in self.models.values() {
                    if entry.matches_path(fragment) && seen.insert(entry.name.as_str()) {
                        selected.push(entry);
                    }
                }
            }
        }

        if let Some(excluded) = &filter.excluded_paths {
            selected.retain(|entry| !excluded.iter().any(|f| entry.matches_path(f)));
        }

        selected
    }
}

/// Selection criteria for `DirectoryStore::list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFilter {
    pub names: Option<Vec<String>>,
    pub included_paths: Option<Vec<String>>,
    pub excluded_paths: Option<Vec<String>>,
}

impl ModelFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn including<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_paths = Some(fragments.into_iter().map(Into::into).collect());
        self
    }

    pub fn excluding<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_paths = Some(fragments.into_iter().map(Into::into).collect());
        self
    }
}

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A single nearest-neighbour result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Model name
    pub id: String,
    /// Rendered descriptor text
    pub document: String,
    pub metadata: RecordMetadata,
    /// Non-negative; smaller is closer
    pub distance: f32,
}

/// A record read back from the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedModel {
    pub id: String,
    pub document: String,
    pub metadata: RecordMetadata,
    /// Hash of document, tags and embedding model
    pub content_hash: String,
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message sent to the completion provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of a project parse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    /// Entries in the directory after the parse
    pub models: usize,
    /// Entries backed by a SQL file
    pub sql_models: usize,
    /// Entries backed only by documentation
    pub documentation_only: usize,
    pub sources: usize,
    pub duration_ms: u64,
    /// Records that were skipped (non-fatal)
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Result of loading models into the vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub models_loaded: usize,
    /// Selected entries with neither documentation nor interpretation
    #[serde(default)]
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

/// Answer from a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    /// Closest models for this question, nearest first
    pub model_ids: Vec<String>,
    /// Models whose documentation was added to the session by this question
    pub new_context: Vec<String>,
}

/// Options for documentation generation
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Write the interpretation to a metadata file next to the model
    pub write_yaml: bool,
    /// Replace an existing record in the model's metadata file
    pub overwrite_existing: bool,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
    })
}
