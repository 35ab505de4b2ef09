//! Model descriptors: the validated, render-ready view of a documented model.

use crate::error::{ModelError, Result};
use crate::types::{ModelDirectoryEntry, ModelDocumentation};

/// A column with a name; unnamed columns never reach a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub description: Option<String>,
}

/// Name, description, columns and tags of one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    name: String,
    description: String,
    columns: Vec<ColumnDescriptor>,
    tags: Vec<String>,
}

impl ModelDescriptor {
    /// Build a descriptor from a documentation record.
    ///
    /// Fails with `ModelError::InvalidModel` if the record has no name or an
    /// empty one. A missing description becomes the empty string and columns
    /// without a name are dropped.
    pub fn new(documentation: &ModelDocumentation) -> Result<Self> {
        let name = documentation
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ModelError::InvalidModel("cannot create a model without a valid name".to_string())
            })?;

        let columns = documentation
            .columns
            .iter()
            .filter_map(|column| {
                column.name.as_ref().map(|name| ColumnDescriptor {
                    name: name.clone(),
                    description: column.description.clone(),
                })
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            description: documentation.description.clone().unwrap_or_default(),
            columns,
            tags: documentation.tags().to_vec(),
        })
    }

    /// Descriptor for a directory entry, from its documentation or else its
    /// interpretation. `None` when the entry has neither.
    pub fn from_entry(entry: &ModelDirectoryEntry) -> Option<Result<Self>> {
        entry.descriptor_source().map(|doc| {
            if doc.name.is_some() {
                Self::new(doc)
            } else {
                let mut named = doc.clone();
                named.name = Some(entry.name.clone());
                Self::new(&named)
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Render with the default prompt template
    pub fn render_as_text(&self) -> String {
        self.render_with(default_template)
    }

    /// Render with a caller-supplied template
    pub fn render_with<F>(&self, template: F) -> String
    where
        F: Fn(&ModelDescriptor) -> String,
    {
        template(self)
    }
}

impl TryFrom<&ModelDocumentation> for ModelDescriptor {
    type Error = crate::error::DocsRagError;

    fn try_from(documentation: &ModelDocumentation) -> Result<Self> {
        Self::new(documentation)
    }
}

fn default_template(model: &ModelDescriptor) -> String {
    let mut text = if model.description.is_empty() {
        format!("The table {} does not have a description.", model.name)
    } else {
        format!(
            "The table {} is described as follows: {}",
            model.name, model.description
        )
    };

    if !model.columns.is_empty() {
        text.push_str("\nThis table contains the following columns:\n");

        for column in &model.columns {
            text.push('\n');
            text.push_str(&format!(
                "- {}: {}",
                column.name,
                column.description.as_deref().unwrap_or("No description")
            ));
        }
    }

    text
}
