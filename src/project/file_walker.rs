//! Discovery of SQL and metadata files under a project's model paths

use crate::error::{ProjectError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Files found under the model paths, each list sorted lexicographically
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectFiles {
    pub sql: Vec<PathBuf>,
    pub yaml: Vec<PathBuf>,
}

pub struct ProjectFileWalker {
    pub(crate) root: PathBuf,
    pub(crate) model_paths: Vec<String>,
    sql_globs: GlobSet,
    yaml_globs: GlobSet,
}

impl ProjectFileWalker {
    pub fn new(root: impl AsRef<Path>, model_paths: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            model_paths: model_paths.to_vec(),
            sql_globs: build_globset(&["*.sql"])?,
            yaml_globs: build_globset(&["*.yml", "*.yaml"])?,
        })
    }

    /// Walk every model path recursively.
    ///
    /// Model paths that do not exist are skipped. A file reachable from two
    /// overlapping model paths is listed once.
    pub fn walk(&self) -> Result<ProjectFiles> {
        let mut files = ProjectFiles::default();

        for model_path in &self.model_paths {
            let base = self.root.join(model_path);
            if !base.is_dir() {
                tracing::debug!("Skipping missing model path: {:?}", base);
                continue;
            }

            let walker = WalkBuilder::new(&base)
                .standard_filters(true)
                .hidden(true)
                .require_git(false)
                .sort_by_file_path(|a, b| a.cmp(b))
                .build();

            for entry in walker {
                let entry = entry.map_err(|e| ProjectError::WalkFailed(e.to_string()))?;
                let path = entry.path();

                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                let Some(file_name) = path.file_name() else {
                    continue;
                };

                if self.sql_globs.is_match(file_name) {
                    files.sql.push(path.to_path_buf());
                } else if self.yaml_globs.is_match(file_name) {
                    files.yaml.push(path.to_path_buf());
                }
            }
        }

        files.sql.sort();
        files.sql.dedup();
        files.yaml.sort();
        files.yaml.dedup();

        tracing::info!(
            "Found {} SQL files and {} metadata files",
            files.sql.len(),
            files.yaml.len()
        );
        Ok(files)
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ProjectError::WalkFailed(e.to_string()))?;
        builder.add(glob);
    }
    Ok(builder
        .build()
        .map_err(|e| ProjectError::WalkFailed(e.to_string()))?)
}
