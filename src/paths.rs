/// Platform-specific default locations
///
/// The directory file, vector database and config file live under the
/// per-user data/config directories reported by `dirs`, falling back to the
/// current directory when the platform reports none.
use std::path::{Path, PathBuf};

const APP_DIR: &str = "dbt-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Config directory for the current platform
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/dbt-rag
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/dbt-rag
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Returns: {data_dir}/dbt-rag/directory.json
    pub fn default_directory_path() -> PathBuf {
        Self::project_data_dir().join("directory.json")
    }

    /// Returns: {data_dir}/dbt-rag/vector_db
    pub fn default_vector_db_path() -> PathBuf {
        Self::project_data_dir().join("vector_db")
    }

    /// Returns: {config_dir}/dbt-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Render `path` relative to `root` with forward slashes.
    ///
    /// Paths outside `root` are returned unchanged.
    pub fn relative_to(path: &Path, root: &Path) -> String {
        let Ok(relative) = path.strip_prefix(root) else {
            return path.to_string_lossy().to_string();
        };
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
