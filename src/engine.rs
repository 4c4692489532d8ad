//! The two extraction paths and the shared entry point.
//!
//! With a caller-supplied context the structural path runs and never fails.
//! Without one, the host's local state is read: workspace store, then its
//! `cursorDiskKV` partition, then the composer in the global store. The first
//! stage producing messages wins. Either way the result is truncated.

use eyre::{Context, Result, eyre};
use serde_json::Value;
use tracing::{debug, info};

use crate::composer::resolve_composer;
use crate::config::ExtractConfig;
use crate::message::Conversation;
use crate::search::find_conversation;
use crate::shapes::{Shape, has_chat_fields, parse_first, parse_record};
use crate::store::{CURSOR_DISK_KV, ITEM_TABLE, SqliteStore, probe};
use crate::workspace::{WorkspaceDescriptor, locate_workspace};

/// `ItemTable` keys known to hold chat data, most specific first.
pub const CHAT_DATA_KEYS: [&str; 3] = [
    "workbench.panel.aichat.view.aichat.chatdata",
    "workbench.panel.chat.view.chatView.chatdata",
    "aiChat.chatdata",
];

/// Extract the conversation from `context` when given, otherwise from the
/// host's persisted state, and apply the configured truncation.
pub fn extract_conversation(
    context: Option<&Value>,
    config: &ExtractConfig,
) -> Result<Conversation> {
    let mut messages = match context {
        Some(context) => extract_from_context(context),
        None => extract_from_storage(config)?,
    };
    config.truncation().apply(&mut messages);
    Ok(messages)
}

/// Known layouts in priority order, then a recursive search.
pub fn extract_from_context(context: &Value) -> Conversation {
    if is_empty_context(context) {
        debug!("empty context");
        return Vec::new();
    }
    if let Some((shape, messages)) = parse_first(&Shape::CONTEXT_PRIORITY, context) {
        debug!(shape = shape.name(), count = messages.len(), "context matched known shape");
        return messages;
    }
    let messages = find_conversation(context);
    if messages.is_empty() {
        debug!("no conversation found in context");
    }
    messages
}

fn is_empty_context(context: &Value) -> bool {
    match context {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Read the most recently used workspace's conversation from disk.
///
/// Fails only on environment errors (storage or database missing, unreadable
/// store). Finding nothing is an empty conversation.
pub fn extract_from_storage(config: &ExtractConfig) -> Result<Conversation> {
    let root = config
        .storage_root()
        .wrap_err("Failed to resolve Cursor workspace storage")?;
    let workspace = locate_workspace(&root).wrap_err("Failed to locate a Cursor workspace")?;
    info!(
        workspace = %workspace.id,
        db = ?workspace.database_path,
        "selected workspace"
    );

    let messages = read_workspace(&workspace)?;
    if !messages.is_empty() {
        return Ok(messages);
    }

    let global_db = config.global_db(&root);
    let messages = resolve_composer(&workspace, &global_db)
        .wrap_err_with(|| format!("Failed to read composer for workspace {}", workspace.id))?;
    if messages.is_empty() {
        info!(workspace = %workspace.id, "no chat data found");
    }
    Ok(messages)
}

fn read_workspace(workspace: &WorkspaceDescriptor) -> Result<Conversation> {
    let db_path = workspace
        .database_path
        .as_deref()
        .ok_or_else(|| eyre!("Workspace {} has no database", workspace.id))?;
    let store = SqliteStore::open(db_path)?;

    let partitions: [(&str, &[&str]); 2] = [(ITEM_TABLE, &CHAT_DATA_KEYS), (CURSOR_DISK_KV, &[])];
    for (table, keys) in partitions {
        if !store.has_table(table)? {
            continue;
        }
        let Some(found) = probe(&store.table(table)?, keys, has_chat_fields)? else {
            continue;
        };
        let messages = parse_record(&found.value);
        if !messages.is_empty() {
            info!(table, key = %found.record.key, count = messages.len(), "read chat data");
            return Ok(messages);
        }
        debug!(table, key = %found.record.key, "record held no messages");
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use serde_json::json;

    #[test]
    fn conversation_context() {
        let ctx = json!({"conversation": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"},
        ]});
        let out = extract_from_context(&ctx);
        assert_eq!(out.len(), 2);
        assert_eq!((out[0].role, out[0].content.as_str()), (Role::User, "hi"));
        assert_eq!((out[1].role, out[1].content.as_str()), (Role::Assistant, "hello"));
    }

    #[test]
    fn empty_contexts() {
        assert!(extract_from_context(&json!({})).is_empty());
        assert!(extract_from_context(&json!([])).is_empty());
        assert!(extract_from_context(&json!(null)).is_empty());
        assert!(extract_from_context(&json!("just text")).is_empty());
    }

    #[test]
    fn falls_back_to_recursive_search() {
        let ctx = json!({"foo": {"bar": [
            {"role": "user", "text": "a"},
            {"role": "assistant", "text": "b"},
        ]}});
        assert_eq!(extract_from_context(&ctx).len(), 2);
    }

    #[test]
    fn chat_history_has_priority() {
        let ctx = json!({
            "conversation": [{"role": "user", "content": "from conversation"}],
            "chatHistory": [{"isUser": true, "content": "from history"}],
        });
        assert_eq!(extract_from_context(&ctx)[0].content, "from history");
    }

    #[test]
    fn context_path_truncates() {
        let config = ExtractConfig {
            max_content_len: 3,
            truncation_marker: "~".to_string(),
            ..Default::default()
        };
        let ctx = json!([{"content": "abcdef"}]);
        let out = extract_conversation(Some(&ctx), &config).unwrap();
        assert_eq!(out[0].content, "abc~");
    }
}
