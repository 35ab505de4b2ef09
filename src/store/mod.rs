//! Persisted model directory
//!
//! The directory lives in a single JSON file (`{"models": {..}, "sources": {..}}`).
//! Every mutation is written to a sibling temp file and renamed into place
//! while holding an exclusive `fs2` lock, so readers never see a partial file.

use crate::error::{Result, StoreError};
use crate::types::{EntryUpdate, ModelDirectoryEntry, ModelFilter, ProjectDirectory};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub struct DirectoryStore {
    path: PathBuf,
    state: RwLock<ProjectDirectory>,
}

impl DirectoryStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let directory = Self::read_file(&path)?;
        Ok(Self {
            path,
            state: RwLock::new(directory),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, picking up writes from other processes
    pub fn reload(&self) -> Result<()> {
        let directory = Self::read_file(&self.path)?;
        *self.write_state()? = directory;
        Ok(())
    }

    /// Look up one entry. A missing name is `Ok(None)`.
    pub fn get(&self, name: &str) -> Result<Option<ModelDirectoryEntry>> {
        Ok(self.read_state()?.models.get(name).cloned())
    }

    /// Entries matching `filter`; see [`ProjectDirectory::select`]
    pub fn list(&self, filter: &ModelFilter) -> Result<Vec<ModelDirectoryEntry>> {
        Ok(self
            .read_state()?
            .select(filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Snapshot of the whole directory
    pub fn directory(&self) -> Result<ProjectDirectory> {
        Ok(self.read_state()?.clone())
    }

    /// Persist a freshly built directory.
    ///
    /// With `prune`, entries and sources missing from `directory` are dropped;
    /// otherwise they are kept. Either way an entry that survives keeps its
    /// stored interpretation unless `directory` supplies a new one.
    pub fn save_directory(&self, directory: ProjectDirectory, prune: bool) -> Result<()> {
        self.mutate(|stored| {
            let mut next = if prune {
                ProjectDirectory::default()
            } else {
                stored.clone()
            };

            for (name, mut entry) in directory.models {
                if entry.interpretation.is_none()
                    && let Some(previous) = stored.models.get(&name)
                {
                    entry.interpretation = previous.interpretation.clone();
                }
                next.models.insert(name, entry);
            }
            next.sources.extend(directory.sources);

            tracing::info!(
                "Saving directory: {} models, {} sources (prune: {})",
                next.models.len(),
                next.sources.len(),
                prune
            );
            *stored = next;
            Ok(())
        })
    }

    /// Insert or replace one entry
    pub fn upsert(&self, entry: ModelDirectoryEntry) -> Result<()> {
        self.mutate(|stored| {
            stored.models.insert(entry.name.clone(), entry);
            Ok(())
        })
    }

    /// Merge `update` into an existing entry without touching other fields
    pub fn update_field(&self, name: &str, update: EntryUpdate) -> Result<()> {
        self.mutate(|stored| {
            let entry = stored
                .models
                .get_mut(name)
                .ok_or_else(|| StoreError::ModelNotFound(name.to_string()))?;
            update.apply_to(entry);
            Ok(())
        })
    }

    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectDirectory) -> Result<()>,
    {
        let mut guard = self.write_state()?;
        let mut next = guard.clone();
        change(&mut next)?;
        self.write_file(&next)?;
        *guard = next;
        Ok(())
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, ProjectDirectory>> {
        Ok(self
            .state
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?)
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, ProjectDirectory>> {
        Ok(self
            .state
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?)
    }

    fn read_file(path: &Path) -> Result<ProjectDirectory> {
        if !path.exists() {
            tracing::debug!("Directory file {:?} not found, starting empty", path);
            return Ok(ProjectDirectory::default());
        }

        let load_error = |reason: String| StoreError::LoadFailed {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let directory: ProjectDirectory =
            serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;

        tracing::info!(
            "Loaded directory with {} models from {:?}",
            directory.models.len(),
            path
        );
        Ok(directory)
    }

    fn write_file(&self, directory: &ProjectDirectory) -> Result<()> {
        let save_error = |reason: String| StoreError::SaveFailed {
            path: self.path.display().to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }

        let lock_path = sibling_path(&self.path, "lock");
        let lock_file = File::create(&lock_path).map_err(|e| StoreError::LockFailed {
            path: lock_path.display().to_string(),
            reason: e.to_string(),
        })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StoreError::LockFailed {
                path: lock_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let content =
            serde_json::to_string_pretty(directory).map_err(|e| save_error(e.to_string()))?;

        let temp_path = sibling_path(&self.path, "tmp");
        let result = (|| -> std::io::Result<()> {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(content.as_bytes())?;
            temp.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        let _ = FileExt::unlock(&lock_file);

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(save_error(e.to_string()).into());
        }

        tracing::debug!("Saved directory to {:?}", self.path);
        Ok(())
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "directory.json".into());
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests;
