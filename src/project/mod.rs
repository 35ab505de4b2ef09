//! dbt project parsing
//!
//! Turns a project on disk into a [`ProjectDirectory`]: every SQL model with
//! its references and transitive dependencies, joined by name with the
//! documentation found in metadata files.

pub mod file_walker;
pub mod manifest;
pub mod references;
pub mod schema_file;

use crate::error::{ProjectError, Result};
use crate::paths::PlatformPaths;
use crate::types::{
    MergePolicy, ModelDirectoryEntry, ModelDocumentation, ProjectDirectory, SourceDeclaration,
    SourceReference, SqlModel,
};
use file_walker::ProjectFileWalker;
use manifest::ProjectManifest;
use rayon::prelude::*;
use references::DependencyGraph;
use schema_file::SchemaFile;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Output of a project build
#[derive(Debug, Clone, Default)]
pub struct ProjectBuild {
    pub directory: ProjectDirectory,
    /// Metadata records that were skipped and name conflicts that were
    /// resolved, with the reason
    pub warnings: Vec<String>,
}

/// A dbt project on disk
#[derive(Debug, Clone)]
pub struct DbtProject {
    root: PathBuf,
    manifest: ProjectManifest,
    merge_policy: MergePolicy,
}

/// One SQL file after reading and reference extraction
struct ParsedSql {
    name: String,
    path: PathBuf,
    contents: String,
    refs: BTreeSet<String>,
    sources: Vec<SourceReference>,
    checksum: String,
}

impl DbtProject {
    /// Open the project rooted at `root`, reading its manifest
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest = ProjectManifest::load(&root)?;
        tracing::info!("Opened dbt project at {:?}", root);

        Ok(Self {
            root,
            manifest,
            merge_policy: MergePolicy::default(),
        })
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> Option<&str> {
        self.manifest.name.as_deref()
    }

    pub fn model_paths(&self) -> &[String] {
        self.manifest.model_paths()
    }

    /// Build the full model directory.
    ///
    /// Files are processed in lexicographic path order, so when two files
    /// derive the same name the later one wins under `MergePolicy::Overwrite`.
    /// A file that cannot be read or parsed aborts the build; nothing partial
    /// is returned.
    pub fn build(&self) -> Result<ProjectBuild> {
        let files = ProjectFileWalker::new(&self.root, self.model_paths())?.walk()?;
        let mut warnings = Vec::new();

        let parsed: Vec<ParsedSql> = files
            .sql
            .par_iter()
            .map(|path| parse_sql_file(path))
            .collect::<Result<_>>()?;

        let mut sql_models: BTreeMap<String, ParsedSql> = BTreeMap::new();
        for parsed in parsed {
            if let Some(previous) = sql_models.get(&parsed.name) {
                self.resolve_conflict(&parsed.name, &previous.path, &parsed.path, &mut warnings)?;
            }
            sql_models.insert(parsed.name.clone(), parsed);
        }

        let mut graph = DependencyGraph::new();
        for parsed in sql_models.values() {
            graph.add_model(parsed.name.clone(), parsed.refs.clone());
        }

        let mut directory = ProjectDirectory::default();
        for (name, parsed) in sql_models {
            let (refs, unresolved_refs) = graph.partition_refs(&name);
            if !unresolved_refs.is_empty() {
                tracing::debug!("Model {} has unresolved refs: {:?}", name, unresolved_refs);
            }
            let deps = graph.resolve(&name);

            let mut entry = ModelDirectoryEntry::new(name.clone());
            entry.sql = Some(SqlModel {
                relative_path: PlatformPaths::relative_to(&parsed.path, &self.root),
                absolute_path: parsed.path,
                sql_contents: parsed.contents,
                refs,
                unresolved_refs,
                deps,
                sources: parsed.sources,
                checksum: parsed.checksum,
            });
            directory.models.insert(name, entry);
        }

        let mut documented_in: BTreeMap<String, PathBuf> = BTreeMap::new();
        for yaml_path in &files.yaml {
            let schema = read_schema_file(yaml_path)?;

            for warning in schema.warnings {
                tracing::warn!("Skipping metadata record: {}", warning);
                warnings.push(warning);
            }

            for documentation in schema.models {
                self.merge_documentation(
                    &mut directory,
                    &mut documented_in,
                    yaml_path,
                    documentation,
                    &mut warnings,
                )?;
            }

            for source in schema.sources {
                self.merge_source(&mut directory, source, &mut warnings)?;
            }
        }

        tracing::info!(
            "Built directory with {} models and {} sources ({} warnings)",
            directory.models.len(),
            directory.sources.len(),
            warnings.len()
        );

        Ok(ProjectBuild {
            directory,
            warnings,
        })
    }

    fn merge_documentation(
        &self,
        directory: &mut ProjectDirectory,
        documented_in: &mut BTreeMap<String, PathBuf>,
        yaml_path: &Path,
        documentation: ModelDocumentation,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let Some(name) = documentation.name.clone() else {
            return Ok(());
        };

        if let Some(previous) = documented_in.get(&name) {
            self.resolve_conflict(&name, previous, yaml_path, warnings)?;
        }
        documented_in.insert(name.clone(), yaml_path.to_path_buf());

        let entry = directory
            .models
            .entry(name.clone())
            .or_insert_with(|| ModelDirectoryEntry::new(name));
        entry.documentation = Some(documentation);
        entry.yaml_path = Some(yaml_path.to_path_buf());
        Ok(())
    }

    fn merge_source(
        &self,
        directory: &mut ProjectDirectory,
        source: SourceDeclaration,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(previous) = directory.sources.get(&source.name) {
            let previous_path = previous.yaml_path.clone().unwrap_or_default();
            let current_path = source.yaml_path.clone().unwrap_or_default();
            self.resolve_conflict(&source.name, &previous_path, &current_path, warnings)?;
        }
        directory.sources.insert(source.name.clone(), source);
        Ok(())
    }

    fn resolve_conflict(
        &self,
        name: &str,
        first: &Path,
        second: &Path,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let first = PlatformPaths::relative_to(first, &self.root);
        let second = PlatformPaths::relative_to(second, &self.root);

        match self.merge_policy {
            MergePolicy::ErrorOnConflict => Err(ProjectError::DuplicateModel {
                name: name.to_string(),
                first,
                second,
            }
            .into()),
            MergePolicy::Overwrite => {
                let warning = format!(
                    "'{}' is defined in both '{}' and '{}'; using '{}'",
                    name, first, second, second
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
                Ok(())
            }
        }
    }
}

fn parse_sql_file(path: &Path) -> Result<ParsedSql> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProjectError::FileReadFailed {
            file: path.display().to_string(),
            reason: "cannot derive a model name from the file name".to_string(),
        })?;

    let contents = read_file(path)?;

    Ok(ParsedSql {
        name,
        path: path.to_path_buf(),
        refs: references::extract_refs(&contents),
        sources: references::extract_sources(&contents),
        checksum: calculate_checksum(&contents),
        contents,
    })
}

/// Malformed records inside the file become warnings on the returned
/// `SchemaFile`; an unreadable or unparseable file fails the whole build.
fn read_schema_file(path: &Path) -> Result<SchemaFile> {
    let content = read_file(path)?;
    Ok(SchemaFile::parse(path, &content)?)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ProjectError::FileReadFailed {
            file: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub(crate) fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
