use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

/// One prior turn sent along with a chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Who wrote the turn.
    pub role: Role,

    /// The text of the turn.
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The new user message.
    pub message: String,

    /// The conversation that preceded `message`, oldest first.
    pub history: Vec<HistoryEntry>,

    /// The backend to route the request to, if the caller has a preference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ChatRequest {
    /// Create a new request from a message and the thread that preceded it.
    pub fn new(message: impl Into<String>, history: &[Message], provider: Option<String>) -> Self {
        Self {
            message: message.into(),
            history: history.iter().map(HistoryEntry::from).collect(),
            provider,
        }
    }
}
