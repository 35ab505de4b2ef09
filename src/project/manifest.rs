//! `dbt_project.yml` loading

use crate::error::{ConfigError, ProjectError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "dbt_project.yml";

/// The parts of `dbt_project.yml` this crate reads
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "model-paths", default)]
    model_paths: Option<Vec<String>>,
}

impl ProjectManifest {
    /// Load the manifest from a project root.
    ///
    /// Fails with `ProjectError::ProjectNotFound` when the file is absent and
    /// with `ConfigError::MissingRequired` when `model-paths` is absent or empty.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path_for(project_root);
        if !path.is_file() {
            return Err(ProjectError::ProjectNotFound(format!(
                "no {} in '{}'",
                MANIFEST_FILE,
                project_root.display()
            ))
            .into());
        }

        let content =
            std::fs::read_to_string(&path).map_err(|e| ProjectError::ManifestParseFailed {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let manifest: ProjectManifest =
            serde_yaml::from_str(&content).map_err(|e| ProjectError::ManifestParseFailed {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if manifest.model_paths.as_ref().is_none_or(|paths| paths.is_empty()) {
            return Err(ConfigError::MissingRequired(format!(
                "model-paths in {}",
                path.display()
            ))
            .into());
        }

        tracing::debug!(
            "Loaded manifest for project {:?} with model paths {:?}",
            manifest.name,
            manifest.model_paths
        );
        Ok(manifest)
    }

    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(MANIFEST_FILE)
    }

    pub fn model_paths(&self) -> &[String] {
        self.model_paths.as_deref().unwrap_or(&[])
    }
}
