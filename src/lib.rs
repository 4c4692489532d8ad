//! # cursor-chat-extract
//!
//! Recovers the conversation of the current [Cursor](https://cursor.com) AI chat
//! as an ordered list of role-tagged messages.
//!
//! ## Two entry paths
//!
//! - **Context**: the caller already holds the chat state as arbitrary JSON. Known
//!   layouts (`chatHistory`, `conversation`, `bubbles`, `messages`/`history`, a
//!   bare array) are tried in that order, then a depth-bounded search for any
//!   nested array of at least two message-like objects.
//! - **Storage**: nothing is supplied. The most recently modified workspace under
//!   `Cursor/User/workspaceStorage` is selected and its `state.vscdb` is probed
//!   for chat data; failing that, the latest composer is fetched from the global
//!   `state.vscdb`.
//!
//! Every store is opened **read-only** and closed on all paths.
//!
//! Finding nothing is not an error: the result is simply empty. Only a missing
//! storage directory or database is reported as a failure.
//!
//! ## Compatibility
//!
//! Cursor's persisted chat layout is undocumented and has changed repeatedly.
//! The recognizers in [`shapes`] cover the layouts observed so far.
pub mod classify;
pub mod composer;
pub mod config;
pub mod engine;
pub mod message;
pub mod render;
pub mod search;
pub mod shapes;
pub mod store;
pub mod truncate;
pub mod workspace;

pub use config::ExtractConfig;
pub use engine::{extract_conversation, extract_from_context, extract_from_storage};
pub use message::{Conversation, Message, Role, SharePayload};
pub use workspace::LocateError;
