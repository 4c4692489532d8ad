//! Discovery of Cursor's per-workspace storage.
//!
//! Layout (relative to the OS config dir, e.g. `~/.config` on Linux,
//! `~/Library/Application Support` on macOS, `%APPDATA%` on Windows):
//!
//! ```text
//! Cursor/User/workspaceStorage/<workspace-id>/state.vscdb
//! Cursor/User/globalStorage/state.vscdb
//! ```

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Database file expected inside every workspace directory and the global one.
pub const STATE_DB_FILE: &str = "state.vscdb";

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("workspace storage not found at {}", .0.display())]
    StorageRootMissing(PathBuf),
    #[error("failed to read workspace storage at {}", .path.display())]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no workspace found in {}", .0.display())]
    NoWorkspace(PathBuf),
    #[error("no usable workspace in {} (none contains state.vscdb)", .0.display())]
    NoUsableWorkspace(PathBuf),
}

/// A workspace storage directory. Recomputed on every extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDescriptor {
    pub id: String,
    pub path: PathBuf,
    pub database_path: Option<PathBuf>,
    /// Modification time of the database file; `DateTime::<Utc>::MIN_UTC` when
    /// the file is absent so such workspaces always rank last.
    pub last_modified: DateTime<Utc>,
}

fn cursor_user_dir() -> Result<PathBuf, LocateError> {
    dirs::config_dir()
        .map(|d| d.join("Cursor").join("User"))
        .ok_or(LocateError::NoConfigDir)
}

/// Default `workspaceStorage` directory for this platform.
pub fn default_storage_root() -> Result<PathBuf, LocateError> {
    cursor_user_dir().map(|d| d.join("workspaceStorage"))
}

/// Global store that sits next to a `workspaceStorage` root.
pub fn global_db_for(storage_root: &Path) -> PathBuf {
    storage_root
        .parent()
        .unwrap_or(storage_root)
        .join("globalStorage")
        .join(STATE_DB_FILE)
}

/// Describe every immediate subdirectory of `root`.
pub fn list_workspaces(root: &Path) -> Result<Vec<WorkspaceDescriptor>, LocateError> {
    if !root.is_dir() {
        return Err(LocateError::StorageRootMissing(root.to_path_buf()));
    }
    let entries = fs::read_dir(root).map_err(|source| LocateError::ReadRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut workspaces = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let db = path.join(STATE_DB_FILE);
        let modified = fs::metadata(&db).and_then(|m| m.modified()).ok();
        workspaces.push(WorkspaceDescriptor {
            id: entry.file_name().to_string_lossy().into_owned(),
            database_path: modified.is_some().then_some(db),
            last_modified: modified
                .map(DateTime::<Utc>::from)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            path,
        });
    }
    Ok(workspaces)
}

/// Pick the workspace whose database was modified most recently.
pub fn locate_workspace(root: &Path) -> Result<WorkspaceDescriptor, LocateError> {
    let workspaces = list_workspaces(root)?;
    if workspaces.is_empty() {
        return Err(LocateError::NoWorkspace(root.to_path_buf()));
    }
    debug!(root = %root.display(), candidates = workspaces.len(), "scanned workspace storage");

    workspaces
        .into_iter()
        .filter(|w| w.database_path.is_some())
        .max_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| b.id.cmp(&a.id))
        })
        .ok_or_else(|| LocateError::NoUsableWorkspace(root.to_path_buf()))
}
