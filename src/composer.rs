//! Composer (threaded conversation) lookup across the workspace and global stores.
//!
//! The workspace store only holds an index of composers. The full record lives
//! in the global store under `composerData:<composerId>`, in whichever of
//! `cursorDiskKV` or `ItemTable` the installed Cursor version uses.

use eyre::{Result, eyre};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::classify::{classify_role, coerce_content, read_timestamp};
use crate::message::{Conversation, Message};
use crate::shapes::Shape;
use crate::store::{CURSOR_DISK_KV, ITEM_TABLE, KeyValueStore, SqliteStore, probe};
use crate::workspace::WorkspaceDescriptor;

/// Keys under which the workspace store keeps its composer index.
pub const COMPOSER_INDEX_KEYS: [&str; 1] = ["composer.composerData"];

/// Global-store tables, in the order they are looked for.
pub const GLOBAL_TABLES: [&str; 2] = [CURSOR_DISK_KV, ITEM_TABLE];

#[derive(Debug, Clone, PartialEq)]
pub struct ComposerDescriptor {
    pub id: String,
    pub last_updated_at: Option<f64>,
}

pub fn composer_key(id: &str) -> String {
    format!("composerData:{id}")
}

fn index_entries(value: &Value) -> Option<&Vec<Value>> {
    ["allComposers", "composers"]
        .iter()
        .find_map(|field| value.get(*field).and_then(Value::as_array))
        .or_else(|| {
            value
                .as_array()
                .filter(|items| items.iter().any(|i| i.get("composerId").is_some()))
        })
}

/// `{allComposers: [...]}`, `{composers: [...]}`, or a bare array of
/// records carrying `composerId`.
pub fn is_composer_index(value: &Value) -> bool {
    index_entries(value).is_some()
}

pub fn composer_descriptors(index: &Value) -> Vec<ComposerDescriptor> {
    index_entries(index)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    Some(ComposerDescriptor {
                        id: entry.get("composerId")?.as_str()?.to_string(),
                        last_updated_at: entry.get("lastUpdatedAt").and_then(Value::as_f64),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Composer with the greatest `lastUpdatedAt`. Ties keep the earlier entry and
/// entries without a timestamp only win when no entry has one.
pub fn select_latest(composers: &[ComposerDescriptor]) -> Option<&ComposerDescriptor> {
    let mut best: Option<&ComposerDescriptor> = None;
    for candidate in composers {
        let better = match best {
            None => true,
            Some(current) => match (candidate.last_updated_at, current.last_updated_at) {
                (Some(c), Some(b)) => c > b,
                (Some(_), None) => true,
                _ => false,
            },
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Find the most recently updated composer listed in a workspace store.
pub fn find_latest_composer(store: &dyn KeyValueStore) -> Result<Option<ComposerDescriptor>> {
    let Some(found) = probe(store, &COMPOSER_INDEX_KEYS, is_composer_index)? else {
        debug!("no composer index in workspace store");
        return Ok(None);
    };
    let composers = composer_descriptors(&found.value);
    debug!(key = %found.record.key, count = composers.len(), "composer index");
    Ok(select_latest(&composers).cloned())
}

/// Turn a global composer record into messages: its `conversation` array,
/// then `messages`, then the record's own text as a single message.
pub fn parse_composer_record(record: &Value) -> Conversation {
    for shape in [Shape::Conversation, Shape::MessagesOrHistory] {
        let messages = shape.parse(record);
        if !messages.is_empty() {
            return messages;
        }
    }
    Message::new(classify_role(record), coerce_content(record))
        .map(|m| vec![m.with_timestamp(read_timestamp(record))])
        .unwrap_or_default()
}

/// Fetch and parse one composer from the global store. A missing store, table
/// or record yields an empty conversation.
pub fn fetch_composer(global_db: &Path, composer_id: &str) -> Result<Conversation> {
    if !global_db.is_file() {
        warn!(path = %global_db.display(), "global store not found");
        return Ok(Vec::new());
    }
    let store = SqliteStore::open(global_db)?;
    let Some(table) = store.first_table(&GLOBAL_TABLES)? else {
        warn!(path = %global_db.display(), "global store has no key/value table");
        return Ok(Vec::new());
    };

    let key = composer_key(composer_id);
    let Some(raw) = store.table(table)?.get(&key)? else {
        debug!(%key, table, "composer record not in global store");
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(record) => Ok(parse_composer_record(&record)),
        Err(e) => {
            debug!(%key, error = %e, "composer record is not JSON");
            Ok(Vec::new())
        }
    }
}

/// Resolve the workspace's latest composer through the global store.
pub fn resolve_composer(workspace: &WorkspaceDescriptor, global_db: &Path) -> Result<Conversation> {
    let db_path = workspace
        .database_path
        .as_deref()
        .ok_or_else(|| eyre!("Workspace {} has no database", workspace.id))?;

    let composer = {
        let store = SqliteStore::open(db_path)?;
        if !store.has_table(ITEM_TABLE)? {
            return Ok(Vec::new());
        }
        find_latest_composer(&store.table(ITEM_TABLE)?)?
    };

    match composer {
        Some(composer) => {
            info!(composer = %composer.id, "reading composer from global store");
            fetch_composer(global_db, &composer.id)
        }
        None => Ok(Vec::new()),
    }
}
