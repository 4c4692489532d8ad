use crate::message::Message;

/// Caps message length, counted in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPolicy {
    pub max_chars: usize,
    pub marker: String,
}

impl TruncationPolicy {
    pub fn new(max_chars: usize, marker: impl Into<String>) -> Self {
        Self {
            max_chars,
            marker: marker.into(),
        }
    }

    /// Cut `content` to `max_chars` and append the marker. Content already within
    /// the cap, or already carrying the marker right after the cap, is left alone.
    pub fn apply_to(&self, content: &mut String) {
        let Some((cut, _)) = content.char_indices().nth(self.max_chars) else {
            return;
        };
        if content[cut..] == *self.marker {
            return;
        }
        content.truncate(cut);
        content.push_str(&self.marker);
    }

    pub fn apply(&self, messages: &mut [Message]) {
        for message in messages {
            self.apply_to(&mut message.content);
        }
    }
}
