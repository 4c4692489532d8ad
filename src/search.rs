//! Depth-bounded search for a message array anywhere inside an unknown value.

use serde_json::Value;
use tracing::debug;

use crate::classify::{classify_role, coerce_content, read_timestamp};
use crate::message::{Conversation, Message};

/// Nodes deeper than this are never visited. The root is level 0.
pub const MAX_DEPTH: usize = 10;

/// A found array must contain at least this many usable messages.
pub const MIN_MESSAGES: usize = 2;

const ROLE_FIELDS: [&str; 4] = ["role", "type", "sender", "isUser"];
const CONTENT_FIELDS: [&str; 3] = ["content", "text", "message"];

/// Depth-first search for the first array that reads as a conversation.
///
/// Arrays are tested before their elements are descended into; object
/// properties are visited in insertion order. Returns an empty conversation
/// when nothing qualifies within [`MAX_DEPTH`] levels.
pub fn find_conversation(root: &Value) -> Conversation {
    let mut stack: Vec<(&Value, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            continue;
        }
        match node {
            Value::Array(items) => {
                let messages = interpret_array(items);
                if messages.len() >= MIN_MESSAGES {
                    debug!(depth, count = messages.len(), "recursive search found message array");
                    return messages;
                }
                stack.extend(items.iter().rev().map(|item| (item, depth + 1)));
            }
            Value::Object(map) => {
                stack.extend(map.values().rev().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }
    Vec::new()
}

fn interpret_array(items: &[Value]) -> Conversation {
    items
        .iter()
        .filter(|item| looks_like_message(item))
        .filter_map(|item| {
            let mut content = coerce_content(item);
            if content.trim().is_empty() {
                content = item
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
            }
            Message::new(classify_role(item), content)
                .map(|m| m.with_timestamp(read_timestamp(item)))
        })
        .collect()
}

fn looks_like_message(item: &Value) -> bool {
    let Some(map) = item.as_object() else {
        return false;
    };
    ROLE_FIELDS.iter().any(|f| map.contains_key(*f))
        && CONTENT_FIELDS.iter().any(|f| map.contains_key(*f))
}
