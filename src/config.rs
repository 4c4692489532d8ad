use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::truncate::TruncationPolicy;
use crate::workspace::{self, LocateError};

pub const DEFAULT_MAX_CONTENT_LEN: usize = 10_000;
pub const DEFAULT_TRUNCATION_MARKER: &str = "\n\n[... (truncated)]";

/// Settings for one extraction. Read-only while extracting.
/// This decouples the engine from how the values were gathered (CLI/Config file).
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Override for the `workspaceStorage` directory.
    pub storage_root: Option<PathBuf>,
    /// Override for the global `state.vscdb`.
    pub global_db: Option<PathBuf>,
    pub max_content_len: usize,
    pub truncation_marker: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            global_db: None,
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_string(),
        }
    }
}

impl ExtractConfig {
    pub fn storage_root(&self) -> Result<PathBuf, LocateError> {
        match &self.storage_root {
            Some(root) => Ok(root.clone()),
            None => workspace::default_storage_root(),
        }
    }

    pub fn global_db(&self, storage_root: &Path) -> PathBuf {
        self.global_db
            .clone()
            .unwrap_or_else(|| workspace::global_db_for(storage_root))
    }

    pub fn truncation(&self) -> TruncationPolicy {
        TruncationPolicy::new(self.max_content_len, self.truncation_marker.clone())
    }
}

/// Persisted preferences, `~/.config/cursor-chat-extract/config.toml` by default.
#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub storage_root: Option<PathBuf>,
    pub global_db: Option<PathBuf>,
    pub max_content_len: Option<usize>,
    pub truncation_marker: Option<String>,
    pub verbose: Option<bool>,
}

pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("cursor-chat-extract/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}
