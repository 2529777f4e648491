use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// The unit exchanged over the chat topic.
///
/// Serialized as a flat JSON object with exactly two string fields:
///
/// ```json
/// { "sender": "Anon_42", "text": "hello" }
/// ```
///
/// There is no id, version or timestamp on the wire. Display timestamps are
/// taken locally when a message is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// True when this message was authored under `identity`.
    pub fn is_echo_of(&self, identity: &Identity) -> bool {
        self.sender == identity.as_str()
    }
}
