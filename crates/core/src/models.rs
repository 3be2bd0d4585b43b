//! Conversation data model shared by the polling and reconciliation layers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message. The backend spells the agent role `"model"` on
/// the wire, so the serde rename is load-bearing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Agent,
}

/// A single conversation entry. Immutable once constructed.
///
/// The `id` is generated locally when the message is decoded and is stable
/// for the object's lifetime; the backend has no notion of message identity,
/// so it never crosses the wire in either direction.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    #[serde(skip, default = "Uuid::new_v4")]
    pub id: Uuid,
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
        }
    }
}

/// The response body of one `/get_updates` poll: a complete replacement view
/// of the conversation, never a partial update.
#[derive(Deserialize, Debug, Clone)]
pub struct ConversationResponse {
    pub conversation: Vec<Message>,
}
