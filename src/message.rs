//! Normalized conversation types produced by every extraction path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation turn role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Function,
}

impl Role {
    /// Parse one of the four canonical role tags. Aliases are not accepted here.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "function" => Some(Self::Function),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Function => "function",
        }
    }

    /// Heading used by the Markdown renderer.
    pub fn title(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
            Self::Function => "Function",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message. `content` is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Build a message, returning `None` when the content is blank.
    pub fn new(role: Role, content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            role,
            content,
            timestamp: None,
        })
    }

    pub fn with_timestamp(mut self, timestamp: Option<DateTime<Utc>>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Messages in the order they were found in the source. Never reordered or deduplicated.
pub type Conversation = Vec<Message>;

/// Message shape accepted by the remote sharing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMessage {
    pub role: Role,
    pub text: String,
}

/// Request body for publishing a conversation: `{title, messages: [{role, text}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub messages: Vec<ShareMessage>,
}

const TITLE_MAX_CHARS: usize = 80;

impl SharePayload {
    /// Build the payload. Without an explicit title, the first line of the first
    /// user message is used.
    pub fn from_conversation(conversation: &[Message], title: Option<&str>) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_title(conversation));

        Self {
            title,
            messages: conversation
                .iter()
                .map(|m| ShareMessage {
                    role: m.role,
                    text: m.content.clone(),
                })
                .collect(),
        }
    }
}

fn default_title(conversation: &[Message]) -> String {
    conversation
        .iter()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.content.lines().map(str::trim).find(|l| !l.is_empty()))
        .map(|line| line.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_else(|| "Untitled conversation".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert!(Message::new(Role::User, "   \n\t").is_none());
        assert!(Message::new(Role::User, "").is_none());
        assert!(Message::new(Role::User, " hi ").is_some());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Function).unwrap();
        assert_eq!(json, "\"function\"");
    }

    #[test]
    fn share_title_from_first_user_line() {
        let conversation = vec![
            Message::new(Role::System, "be nice").unwrap(),
            Message::new(Role::User, "\n  How do I parse JSON?\nmore").unwrap(),
            Message::new(Role::Assistant, "serde").unwrap(),
        ];
        let payload = SharePayload::from_conversation(&conversation, None);
        assert_eq!(payload.title, "How do I parse JSON?");
        assert_eq!(payload.messages.len(), 3);
        assert_eq!(payload.messages[2].text, "serde");
    }

    #[test]
    fn share_title_explicit_and_fallback() {
        let payload = SharePayload::from_conversation(&[], Some("  My chat "));
        assert_eq!(payload.title, "My chat");
        let payload = SharePayload::from_conversation(&[], None);
        assert_eq!(payload.title, "Untitled conversation");
    }
}
