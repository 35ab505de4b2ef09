//! Parsing of metadata (schema) files: `models:` and `sources:` lists

use crate::error::ProjectError;
use crate::types::{ModelDocumentation, SourceDeclaration};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct RawSchemaFile {
    #[serde(default)]
    models: Option<Vec<serde_yaml::Value>>,
    #[serde(default)]
    sources: Option<Vec<serde_yaml::Value>>,
}

/// Records read from one metadata file
#[derive(Debug, Default)]
pub struct SchemaFile {
    pub models: Vec<ModelDocumentation>,
    pub sources: Vec<SourceDeclaration>,
    /// Records that were skipped, with the reason
    pub warnings: Vec<String>,
}

impl SchemaFile {
    /// Parse a metadata file's contents.
    ///
    /// An empty document yields no records. A document that is not valid
    /// YAML is an error; individual records that do not fit the model or
    /// source shape, or lack a name, are skipped and reported in `warnings`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ProjectError> {
        let schema_error = |reason: String| ProjectError::SchemaParseFailed {
            file: path.display().to_string(),
            reason,
        };

        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| schema_error(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }

        let raw: RawSchemaFile =
            serde_yaml::from_value(value).map_err(|e| schema_error(e.to_string()))?;

        let mut schema = SchemaFile::default();

        for (idx, record) in raw.models.unwrap_or_default().into_iter().enumerate() {
            match serde_yaml::from_value::<ModelDocumentation>(record) {
                Ok(model) if model.name.as_deref().is_some_and(|n| !n.trim().is_empty()) => {
                    schema.models.push(model)
                }
                Ok(_) => schema.warnings.push(format!(
                    "{}: model #{} has no name",
                    path.display(),
                    idx + 1
                )),
                Err(e) => schema.warnings.push(format!(
                    "{}: model #{} is malformed: {}",
                    path.display(),
                    idx + 1,
                    e
                )),
            }
        }

        for (idx, record) in raw.sources.unwrap_or_default().into_iter().enumerate() {
            match serde_yaml::from_value::<SourceDeclaration>(record) {
                Ok(mut source) if !source.name.trim().is_empty() => {
                    source.yaml_path = Some(path.to_path_buf());
                    schema.sources.push(source);
                }
                Ok(_) => schema.warnings.push(format!(
                    "{}: source #{} has no name",
                    path.display(),
                    idx + 1
                )),
                Err(e) => schema.warnings.push(format!(
                    "{}: source #{} is malformed: {}",
                    path.display(),
                    idx + 1,
                    e
                )),
            }
        }

        Ok(schema)
    }
}
