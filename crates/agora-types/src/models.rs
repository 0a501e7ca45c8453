use serde::{Deserialize, Serialize};

/// A single message in the shared room. This is also the wire frame
/// exchanged over the WebSocket in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    /// Build a message from an inbound text frame.
    ///
    /// Clients may send any JSON object carrying `text` (usually a full
    /// `{"author", "text"}` frame) or bare text.
    /// The author is always the authenticated identity, never what the
    /// client claims.
    pub fn from_frame(author: &str, frame: &str) -> Self {
        let text = match serde_json::from_str::<InboundFrame>(frame) {
            Ok(inbound) => inbound.text,
            Err(_) => frame.to_string(),
        };
        Self::new(author, text)
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// What a client frame must carry. Any other fields, `author` included,
/// are ignored.
#[derive(Deserialize)]
struct InboundFrame {
    text: String,
}
