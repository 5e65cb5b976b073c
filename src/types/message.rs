use serde::{Deserialize, Serialize};

use crate::types::Role;
use crate::utils::time::now_millis;

/// One entry in the chat thread.
///
/// Messages are immutable once appended to a thread.  The timestamp doubles as
/// the render key for list diffing, so two messages created within the same
/// millisecond share a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,

    /// The message body, as markdown for assistant messages.
    pub content: String,

    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// The backend that produced an assistant message, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl Message {
    /// Create a new `Message` with an explicit timestamp.
    pub fn new(role: Role, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
            provider: None,
        }
    }

    /// Create a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, now_millis())
    }

    /// Create an assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, now_millis())
    }

    /// Attach a provider tag.
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    /// The key used to identify this message in a rendered list.
    pub fn render_key(&self) -> String {
        self.timestamp.to_string()
    }

    /// Returns true if the user wrote this message.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
