//! Role and content inference for untyped, message-like JSON records.
//!
//! Chat records have been persisted in several layouts over time, so nothing
//! here assumes a schema. Every function is total: missing or oddly typed
//! fields simply fall through to the next rule.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::message::Role;

/// Infer the role of a message-like record.
///
/// First match wins:
/// 1. `role` equal to a canonical tag
/// 2. boolean `isUser`
/// 3. `type` alias (`human`, `ai`, `bot`, `1`, `2`, or a canonical tag)
/// 4. `sender` alias, same table as `type`
/// 5. [`Role::User`]
pub fn classify_role(record: &Value) -> Role {
    if let Some(role) = record
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::from_tag)
    {
        return role;
    }
    if let Some(is_user) = record.get("isUser").and_then(Value::as_bool) {
        return if is_user { Role::User } else { Role::Assistant };
    }
    record
        .get("type")
        .and_then(role_alias)
        .or_else(|| record.get("sender").and_then(role_alias))
        .unwrap_or(Role::User)
}

/// Role for chat-history entries, which only ever carry `role` or `isUser`.
pub fn chat_history_role(record: &Value) -> Role {
    if let Some(role) = record
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::from_tag)
    {
        return role;
    }
    match record.get("isUser").and_then(Value::as_bool) {
        Some(false) => Role::Assistant,
        _ => Role::User,
    }
}

fn role_alias(value: &Value) -> Option<Role> {
    match value {
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "human" => Some(Role::User),
            "ai" | "bot" => Some(Role::Assistant),
            other => Role::from_tag(other),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Role::User),
            Some(2) => Some(Role::Assistant),
            _ => None,
        },
        _ => None,
    }
}

/// Best-effort plain-text body of a record.
///
/// Tries a string `content`, a string `text`, `content.text`, then an array
/// `content` whose string or `{text}` parts are joined with newlines. Returns an
/// empty string when nothing matches; callers drop those records.
pub fn coerce_content(record: &Value) -> String {
    let content = record.get("content");

    if let Some(s) = content.and_then(Value::as_str).filter(|s| !is_blank(s)) {
        return s.to_string();
    }
    if let Some(s) = record
        .get("text")
        .and_then(Value::as_str)
        .filter(|s| !is_blank(s))
    {
        return s.to_string();
    }
    if let Some(s) = content
        .and_then(|c| c.get("text"))
        .and_then(Value::as_str)
        .filter(|s| !is_blank(s))
    {
        return s.to_string();
    }
    if let Some(parts) = content.and_then(Value::as_array) {
        let joined = parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) => part.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if !is_blank(&joined) {
            return joined;
        }
    }
    String::new()
}

/// Flat variant used by chat-history entries: string `content` or string `text`.
pub fn coerce_flat_content(record: &Value) -> String {
    ["content", "text"]
        .iter()
        .filter_map(|field| record.get(*field).and_then(Value::as_str))
        .find(|s| !is_blank(s))
        .unwrap_or_default()
        .to_string()
}

/// Read a message timestamp from `timestamp`, `createdAt` or `created_at`.
///
/// Numbers are epoch seconds, or milliseconds when larger than 1e11.
/// Strings must be RFC 3339.
pub fn read_timestamp(record: &Value) -> Option<DateTime<Utc>> {
    ["timestamp", "createdAt", "created_at"]
        .iter()
        .filter_map(|field| record.get(*field))
        .find_map(parse_instant)
}

fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let millis = if raw.abs() > 1e11 { raw } else { raw * 1000.0 };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
