//! Recognizers for the known layouts of persisted chat data.
//!
//! Each [`Shape`] either yields a non-empty message list or an empty one
//! meaning "not this layout". No recognizer ever errors.

use serde_json::Value;

use crate::classify::{
    chat_history_role, classify_role, coerce_content, coerce_flat_content, read_timestamp,
};
use crate::message::{Conversation, Message, Role};

/// One known conversation layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `{ "chatHistory": [...] }`
    ChatHistory,
    /// `{ "conversation": [...] }`
    Conversation,
    /// `{ "bubbles": [...] }`
    Bubbles,
    /// `{ "messages": [...] }`, else `{ "history": [...] }`
    MessagesOrHistory,
    /// `[...]`
    FlatArray,
    /// `{ "tabs": [{ "conversation": [...] }, ...] }`; the last tab wins.
    Tabs,
    /// `{ "chats": { "<id>": { "messages": [...] }, ... } }`; the first chat wins.
    Chats,
}

impl Shape {
    /// Order tried for a caller-supplied context.
    pub const CONTEXT_PRIORITY: [Shape; 5] = [
        Shape::ChatHistory,
        Shape::Conversation,
        Shape::Bubbles,
        Shape::MessagesOrHistory,
        Shape::FlatArray,
    ];

    /// Order tried for a record read from a store.
    pub const RECORD_PRIORITY: [Shape; 4] = [
        Shape::Tabs,
        Shape::Chats,
        Shape::MessagesOrHistory,
        Shape::Conversation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Shape::ChatHistory => "chat-history",
            Shape::Conversation => "conversation",
            Shape::Bubbles => "bubbles",
            Shape::MessagesOrHistory => "messages",
            Shape::FlatArray => "flat-array",
            Shape::Tabs => "tabs",
            Shape::Chats => "chats",
        }
    }

    pub fn parse(self, value: &Value) -> Conversation {
        match self {
            Shape::ChatHistory => value
                .get("chatHistory")
                .and_then(Value::as_array)
                .map(|items| collect(items, chat_history_role, coerce_flat_content))
                .unwrap_or_default(),
            Shape::Conversation => array_field(value, "conversation"),
            Shape::Bubbles => array_field(value, "bubbles"),
            Shape::MessagesOrHistory => {
                let messages = array_field(value, "messages");
                if messages.is_empty() {
                    array_field(value, "history")
                } else {
                    messages
                }
            }
            Shape::FlatArray => value
                .as_array()
                .map(|items| collect(items, classify_role, coerce_content))
                .unwrap_or_default(),
            Shape::Tabs => {
                let Some(tab) = value
                    .get("tabs")
                    .and_then(Value::as_array)
                    .and_then(|tabs| tabs.last())
                else {
                    return Vec::new();
                };
                if tab.get("conversation").is_some_and(Value::is_array) {
                    array_field(tab, "conversation")
                } else {
                    array_field(tab, "bubbles")
                }
            }
            Shape::Chats => value
                .get("chats")
                .and_then(Value::as_object)
                .and_then(|chats| chats.values().next())
                .map(|chat| array_field(chat, "messages"))
                .unwrap_or_default(),
        }
    }
}

/// Run shapes in order and return the first non-empty result.
pub fn parse_first(shapes: &[Shape], value: &Value) -> Option<(Shape, Conversation)> {
    shapes.iter().find_map(|&shape| {
        let messages = shape.parse(value);
        (!messages.is_empty()).then_some((shape, messages))
    })
}

/// Parse a record fetched from a store by dispatching on its top-level fields.
pub fn parse_record(value: &Value) -> Conversation {
    parse_first(&Shape::RECORD_PRIORITY, value)
        .map(|(_, messages)| messages)
        .unwrap_or_default()
}

/// Whether a parsed store value carries a field some recognizer understands.
pub fn has_chat_fields(value: &Value) -> bool {
    ["tabs", "chats", "messages", "conversation"]
        .iter()
        .any(|field| value.get(*field).is_some())
        || crate::composer::is_composer_index(value)
}

fn array_field(value: &Value, field: &str) -> Conversation {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|items| collect(items, classify_role, coerce_content))
        .unwrap_or_default()
}

pub(crate) fn collect(
    items: &[Value],
    role: fn(&Value) -> Role,
    content: fn(&Value) -> String,
) -> Conversation {
    items
        .iter()
        .filter_map(|item| {
            Message::new(role(item), content(item))
                .map(|m| m.with_timestamp(read_timestamp(item)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roles(messages: &[Message]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    fn texts(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn chat_history() {
        let ctx = json!({"chatHistory": [
            {"isUser": true, "content": "q"},
            {"isUser": false, "text": "a"},
            {"role": "user", "content": {"text": "nested is ignored"}},
        ]});
        let out = Shape::ChatHistory.parse(&ctx);
        assert_eq!(texts(&out), ["q", "a"]);
        assert_eq!(roles(&out), [Role::User, Role::Assistant]);
    }

    #[test]
    fn conversation_and_bubbles() {
        let ctx = json!({
            "conversation": [{"type": 1, "text": "hi"}, {"type": 2, "text": "yo"}],
            "bubbles": [{"type": "user", "text": "b1"}, {"type": "ai", "text": ""}, {"type": "ai", "text": "b2"}],
        });
        assert_eq!(texts(&Shape::Conversation.parse(&ctx)), ["hi", "yo"]);
        let bubbles = Shape::Bubbles.parse(&ctx);
        assert_eq!(texts(&bubbles), ["b1", "b2"]);
        assert_eq!(roles(&bubbles), [Role::User, Role::Assistant]);
    }

    #[test]
    fn messages_then_history() {
        let with_messages = json!({"messages": [{"content": "m"}], "history": [{"content": "h"}]});
        assert_eq!(texts(&Shape::MessagesOrHistory.parse(&with_messages)), ["m"]);

        let empty_messages = json!({"messages": [{"content": " "}], "history": [{"content": "h"}]});
        assert_eq!(texts(&Shape::MessagesOrHistory.parse(&empty_messages)), ["h"]);
    }

    #[test]
    fn flat_array() {
        let ctx = json!([{"role": "system", "content": "s"}, {"content": ["p1", "p2"]}, {}]);
        let out = Shape::FlatArray.parse(&ctx);
        assert_eq!(texts(&out), ["s", "p1\np2"]);
        assert!(Shape::FlatArray.parse(&json!({"a": 1})).is_empty());
    }

    #[test]
    fn tabs_use_last_tab() {
        let record = json!({"tabs": [
            {"conversation": [{"role": "user", "content": "old"}]},
            {"conversation": [{"role": "user", "content": "new"}, {"role": "assistant", "content": "reply"}]},
        ]});
        assert_eq!(texts(&Shape::Tabs.parse(&record)), ["new", "reply"]);
    }

    #[test]
    fn tabs_fall_back_to_bubbles() {
        let record = json!({"tabs": [{"bubbles": [{"type": "user", "text": "q"}, {"type": "ai", "text": "a"}]}]});
        assert_eq!(texts(&Shape::Tabs.parse(&record)), ["q", "a"]);
    }

    #[test]
    fn chats_use_first_key_in_insertion_order() {
        let raw = r#"{"chats": {
            "zeta": {"messages": [{"role": "user", "content": "first"}]},
            "alpha": {"messages": [{"role": "user", "content": "second"}]}
        }}"#;
        let record: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(texts(&Shape::Chats.parse(&record)), ["first"]);
    }

    #[test]
    fn blank_entries_dropped_everywhere() {
        let blank = json!([{"role": "user", "content": "  "}, {"role": "assistant", "text": "\n"}]);
        let fixtures = [
            json!({"chatHistory": blank}),
            json!({"conversation": blank}),
            json!({"bubbles": blank}),
            json!({"messages": blank}),
            json!({"history": blank}),
            blank.clone(),
            json!({"tabs": [{"conversation": blank}]}),
            json!({"chats": {"a": {"messages": blank}}}),
        ];
        let shapes = [
            Shape::ChatHistory,
            Shape::Conversation,
            Shape::Bubbles,
            Shape::MessagesOrHistory,
            Shape::MessagesOrHistory,
            Shape::FlatArray,
            Shape::Tabs,
            Shape::Chats,
        ];
        for (shape, fixture) in shapes.iter().zip(fixtures.iter()) {
            assert!(shape.parse(fixture).is_empty(), "{} kept blanks", shape.name());
        }
    }

    #[test]
    fn record_dispatch_and_recognition() {
        let record = json!({"messages": [{"role": "user", "content": "x"}]});
        assert_eq!(texts(&parse_record(&record)), ["x"]);
        assert!(has_chat_fields(&record));
        assert!(!has_chat_fields(&json!({"settings": {}})));
        assert!(parse_record(&json!({"bubbles": [{"text": "not a record shape"}]})).is_empty());
    }

    #[test]
    fn first_match_reports_shape() {
        let ctx = json!({"bubbles": [{"text": "b"}], "history": [{"text": "h"}]});
        let (shape, out) = parse_first(&Shape::CONTEXT_PRIORITY, &ctx).unwrap();
        assert_eq!(shape, Shape::Bubbles);
        assert_eq!(texts(&out), ["b"]);
    }
}
