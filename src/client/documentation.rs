//! Documentation generation: interpret models with the language model and
//! write the result back into the directory and metadata files.

use super::DocsClient;
use crate::error::{CompletionError, ModelError, StoreError};
use crate::instructions::INTERPRET_MODEL_INSTRUCTIONS;
use crate::types::{
    EntryUpdate, GenerateOptions, ModelDirectoryEntry, ModelDocumentation, PromptMessage,
};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// A freshly written metadata file
#[derive(Serialize)]
struct SidecarFile<'a> {
    version: u32,
    models: Vec<&'a ModelDocumentation>,
}

impl DocsClient {
    /// Generate an interpretation for one model from its SQL and the stored
    /// interpretations of the models it references. Nothing is persisted.
    pub async fn interpret_model(&self, name: &str) -> Result<ModelDocumentation> {
        let entry = self.require_entry(name)?;
        self.interpret_entry(&entry).await
    }

    /// Generate documentation for `name`.
    ///
    /// Dependencies without an interpretation are interpreted first, upstream
    /// first, and each one is saved as soon as it is generated. The model's own
    /// interpretation is then generated, optionally written to its metadata
    /// file, and saved. Cancelling the token stops before the next model.
    pub async fn generate_documentation(
        &self,
        name: &str,
        options: GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<ModelDocumentation> {
        let entry = self.require_entry(name)?;

        for dep in entry.deps() {
            let Some(dep_entry) = self.store.get(dep)? else {
                tracing::warn!("Dependency {} of {} is not in the directory", dep, name);
                continue;
            };
            if dep_entry.interpretation.is_some() {
                continue;
            }

            let interpretation = self.interpret_cancellable(&dep_entry, cancel).await?;
            self.store
                .update_field(dep, EntryUpdate::interpretation(interpretation))
                .with_context(|| format!("Failed to save interpretation for {}", dep))?;
        }

        // Dependencies may have been updated above
        let entry = self.require_entry(name)?;
        let interpretation = self.interpret_cancellable(&entry, cancel).await?;

        let mut update = EntryUpdate::interpretation(interpretation.clone());
        if options.write_yaml {
            let path = write_sidecar(&entry, &interpretation, options.overwrite_existing)?;
            tracing::info!("Wrote documentation for {} to {}", name, path.display());
            update = update.with_yaml_path(path);
        }

        self.store
            .update_field(name, update)
            .with_context(|| format!("Failed to save interpretation for {}", name))?;
        Ok(interpretation)
    }

    fn require_entry(&self, name: &str) -> Result<ModelDirectoryEntry> {
        self.store
            .get(name)?
            .ok_or_else(|| StoreError::ModelNotFound(name.to_string()).into())
    }

    async fn interpret_cancellable(
        &self,
        entry: &ModelDirectoryEntry,
        cancel: &CancellationToken,
    ) -> Result<ModelDocumentation> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled.into());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(CompletionError::Cancelled.into()),
            result = self.interpret_entry(entry) => result,
        }
    }

    async fn interpret_entry(&self, entry: &ModelDirectoryEntry) -> Result<ModelDocumentation> {
        let Some(sql) = entry.sql_contents() else {
            return Err(ModelError::InvalidModel(format!(
                "model '{}' has no SQL file to interpret",
                entry.name
            ))
            .into());
        };
        tracing::info!("Interpreting model: {}", entry.name);

        let mut references = Vec::new();
        for reference in entry.refs() {
            let interpretation = self
                .store
                .get(reference)?
                .and_then(|e| e.interpretation);
            references.push((reference.to_string(), interpretation));
        }

        let prompt = interpretation_prompt(&entry.name, sql, &references);
        let reply = self.complete(prompt).await?;
        let mut interpretation = parse_interpretation(&reply)?;
        if interpretation.name.is_none() {
            interpretation.name = Some(entry.name.clone());
        }
        Ok(interpretation)
    }
}

/// Instruction, the model's SQL, then each direct reference's interpretation
pub(crate) fn interpretation_prompt(
    name: &str,
    sql: &str,
    references: &[(String, Option<ModelDocumentation>)],
) -> Vec<PromptMessage> {
    let mut prompt = vec![
        PromptMessage::system(INTERPRET_MODEL_INSTRUCTIONS),
        PromptMessage::system(format!(
            "The model you are interpreting is called {} following is the Jinja SQL code for the model:\n\n{}",
            name, sql
        )),
    ];

    if !references.is_empty() {
        let names: Vec<&str> = references.iter().map(|(n, _)| n.as_str()).collect();
        prompt.push(PromptMessage::system(format!(
            "The model {} references the following models: {}.\nThe interpretation for each of these models is as follows:",
            name,
            names.join(", ")
        )));

        for (reference, interpretation) in references {
            let rendered = serde_json::to_string_pretty(interpretation)
                .unwrap_or_else(|_| "null".to_string());
            prompt.push(PromptMessage::system(format!(
                "The model {} is interpreted as follows:\n{}",
                reference, rendered
            )));
        }
    }

    prompt
}

/// Parse a reply as a documentation record, ignoring Markdown code fences
pub(crate) fn parse_interpretation(reply: &str) -> Result<ModelDocumentation, CompletionError> {
    let cleaned = reply.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
        .map_err(|e| CompletionError::InvalidResponse(format!("not a model interpretation: {}", e)))
}

/// `_<stem>.yml` next to the model's SQL file
fn sidecar_path(sql_path: &Path) -> Option<PathBuf> {
    let stem = sql_path.file_stem()?.to_string_lossy();
    Some(sql_path.with_file_name(format!("_{}.yml", stem)))
}

/// Write `interpretation` to the entry's metadata file and return its path.
///
/// Without an existing file a new one is created next to the SQL file. An
/// existing file, whether it is the entry's metadata file or a `_<stem>.yml`
/// already sitting next to the SQL file, is only modified with
/// `overwrite_existing`; the record with the same name is replaced, or the
/// interpretation is appended.
fn write_sidecar(
    entry: &ModelDirectoryEntry,
    interpretation: &ModelDocumentation,
    overwrite_existing: bool,
) -> Result<PathBuf> {
    let path = match &entry.yaml_path {
        Some(path) => path.clone(),
        None => entry
            .absolute_path()
            .and_then(sidecar_path)
            .ok_or_else(|| anyhow::anyhow!("Model {} has no SQL file path", entry.name))?,
    };

    if !path.exists() {
        let content = SidecarFile {
            version: 2,
            models: vec![interpretation],
        };
        let yaml = serde_yaml::to_string(&content)?;
        std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        return Ok(path);
    }

    if !overwrite_existing {
        return Err(CompletionError::DocumentationExists {
            name: entry.name.clone(),
            path: path.display().to_string(),
        }
        .into());
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut document: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    merge_model_record(&mut document, &entry.name, interpretation)
        .with_context(|| format!("Cannot update {}", path.display()))?;

    let yaml = serde_yaml::to_string(&document)?;
    std::fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Replace the `models:` record named `name`, or append one
fn merge_model_record(
    document: &mut Value,
    name: &str,
    interpretation: &ModelDocumentation,
) -> Result<()> {
    if document.is_null() {
        *document = Value::Mapping(Default::default());
    }
    let mapping = document
        .as_mapping_mut()
        .context("metadata file is not a mapping")?;
    if mapping.get("models").is_none_or(Value::is_null) {
        mapping.insert(Value::from("models"), Value::Sequence(Vec::new()));
    }
    let models = mapping
        .get_mut("models")
        .and_then(Value::as_sequence_mut)
        .context("`models` is not a list")?;

    let record = serde_yaml::to_value(interpretation)?;
    let existing = models
        .iter()
        .position(|m| m.get("name").and_then(Value::as_str) == Some(name));
    match existing {
        Some(position) => models[position] = record,
        None => models.push(record),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnDocumentation, SqlModel};
    use tempfile::TempDir;

    fn interpretation(name: &str, description: &str) -> ModelDocumentation {
        ModelDocumentation {
            name: Some(name.to_string()),
            description: Some(description.to_string()),
            columns: vec![ColumnDocumentation {
                name: Some("id".to_string()),
                description: Some("primary key".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_without_references() {
        let prompt = interpretation_prompt("orders", "select 1", &[]);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].content, INTERPRET_MODEL_INSTRUCTIONS);
        assert_eq!(
            prompt[1].content,
            "The model you are interpreting is called orders following is the Jinja SQL code for the model:\n\nselect 1"
        );
    }

    #[test]
    fn test_prompt_with_references() {
        let references = vec![
            ("stg_orders".to_string(), Some(interpretation("stg_orders", "raw orders"))),
            ("stg_payments".to_string(), None),
        ];
        let prompt = interpretation_prompt("orders", "select 1", &references);

        assert_eq!(prompt.len(), 5);
        assert_eq!(
            prompt[2].content,
            "The model orders references the following models: stg_orders, stg_payments.\nThe interpretation for each of these models is as follows:"
        );
        assert!(prompt[3]
            .content
            .starts_with("The model stg_orders is interpreted as follows:\n{"));
        assert!(prompt[3].content.contains("\"description\": \"raw orders\""));
        assert_eq!(
            prompt[4].content,
            "The model stg_payments is interpreted as follows:\nnull"
        );
    }

    #[test]
    fn test_parse_interpretation_strips_fences() {
        let reply = "```json\n{\"model\": \"orders\", \"description\": \"one row per order\", \"columns\": [{\"name\": \"id\", \"description\": \"key\"}]}\n```";
        let parsed = parse_interpretation(reply).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("orders"));
        assert_eq!(parsed.description.as_deref(), Some("one row per order"));
        assert_eq!(parsed.columns.len(), 1);
    }

    #[test]
    fn test_parse_interpretation_rejects_prose() {
        let err = parse_interpretation("I think this model is about orders.").unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }

    #[test]
    fn test_sidecar_path() {
        let path = sidecar_path(Path::new("/project/models/mart/orders.sql")).unwrap();
        assert_eq!(path, PathBuf::from("/project/models/mart/_orders.yml"));
    }

    #[test]
    fn test_merge_replaces_named_record() {
        let mut document: Value = serde_yaml::from_str(
            "version: 2\nmodels:\n  - name: orders\n    description: old\n  - name: customers\n",
        )
        .unwrap();

        merge_model_record(&mut document, "orders", &interpretation("orders", "new")).unwrap();

        let models = document["models"].as_sequence().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0]["description"].as_str(), Some("new"));
        assert_eq!(models[1]["name"].as_str(), Some("customers"));
        assert_eq!(document["version"].as_u64(), Some(2));
    }

    #[test]
    fn test_merge_appends_missing_record() {
        let mut document: Value =
            serde_yaml::from_str("version: 2\nsources:\n  - name: shop\n").unwrap();
        merge_model_record(&mut document, "orders", &interpretation("orders", "new")).unwrap();

        let models = document["models"].as_sequence().unwrap();
        assert_eq!(models.len(), 1);
        assert!(document.get("sources").is_some());
    }

    #[test]
    fn test_write_sidecar_refuses_existing_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("schema.yml");
        std::fs::write(&yaml, "version: 2\nmodels: []\n").unwrap();

        let entry = ModelDirectoryEntry {
            name: "orders".to_string(),
            yaml_path: Some(yaml.clone()),
            ..Default::default()
        };
        let err = write_sidecar(&entry, &interpretation("orders", "x"), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompletionError>(),
            Some(CompletionError::DocumentationExists { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(&yaml).unwrap(),
            "version: 2\nmodels: []\n"
        );
    }

    fn sql_entry(name: &str, sql_path: &Path) -> ModelDirectoryEntry {
        ModelDirectoryEntry {
            name: name.to_string(),
            sql: Some(SqlModel {
                absolute_path: sql_path.to_path_buf(),
                relative_path: format!("models/{}.sql", name),
                sql_contents: "select 1".to_string(),
                refs: Default::default(),
                unresolved_refs: Default::default(),
                deps: Vec::new(),
                sources: Vec::new(),
                checksum: String::new(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_write_sidecar_creates_new_file() {
        let dir = TempDir::new().unwrap();
        let entry = sql_entry("orders", &dir.path().join("orders.sql"));

        let path = write_sidecar(&entry, &interpretation("orders", "new"), false).unwrap();
        assert_eq!(path, dir.path().join("_orders.yml"));

        let document: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["version"].as_u64(), Some(2));
        assert_eq!(document["models"][0]["description"].as_str(), Some("new"));
    }

    #[test]
    fn test_write_sidecar_keeps_untracked_file_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let sidecar = dir.path().join("_orders.yml");
        std::fs::write(&sidecar, "version: 2\nsources:\n  - name: shop\n").unwrap();
        let entry = sql_entry("orders", &dir.path().join("orders.sql"));

        let err = write_sidecar(&entry, &interpretation("orders", "x"), false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompletionError>(),
            Some(CompletionError::DocumentationExists { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(&sidecar).unwrap(),
            "version: 2\nsources:\n  - name: shop\n"
        );
    }

    #[test]
    fn test_write_sidecar_merges_into_untracked_file_with_overwrite() {
        let dir = TempDir::new().unwrap();
        let sidecar = dir.path().join("_orders.yml");
        std::fs::write(&sidecar, "version: 2\nsources:\n  - name: shop\n").unwrap();
        let entry = sql_entry("orders", &dir.path().join("orders.sql"));

        let path = write_sidecar(&entry, &interpretation("orders", "new"), true).unwrap();
        assert_eq!(path, sidecar);

        let document: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["sources"][0]["name"].as_str(), Some("shop"));
        assert_eq!(document["models"][0]["name"].as_str(), Some("orders"));
    }
}
