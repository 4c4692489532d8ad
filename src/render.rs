use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

use crate::message::{Message, SharePayload};

#[derive(Serialize)]
struct Frontmatter<'a> {
    title: &'a str,
    extracted_at: DateTime<Utc>,
    messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_message_at: Option<DateTime<Utc>>,
}

pub fn write_markdown<W: Write>(
    writer: &mut W,
    title: &str,
    conversation: &[Message],
    extracted_at: DateTime<Utc>,
) -> io::Result<()> {
    let fm = Frontmatter {
        title,
        extracted_at,
        messages: conversation.len(),
        first_message_at: conversation.iter().find_map(|m| m.timestamp),
    };

    writeln!(writer, "---")?;
    let yaml = serde_yaml::to_string(&fm).map_err(io::Error::other)?;
    write!(writer, "{}", yaml)?;
    writeln!(writer, "---")?;
    writeln!(writer)?;

    for msg in conversation {
        writeln!(writer, "## {}", msg.role.title())?;
        writeln!(writer)?;
        writeln!(writer, "{}", msg.content)?;
        writeln!(writer)?;
    }

    Ok(())
}

/// Pretty-printed share payload.
pub fn write_json<W: Write>(writer: &mut W, payload: &SharePayload) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, payload)?;
    writeln!(writer)
}
