// Public modules
pub mod chat_reply;
pub mod chat_request;
pub mod message;
pub mod role;

// Re-exports
pub use chat_reply::ChatReply;
pub use chat_request::{ChatRequest, HistoryEntry};
pub use message::Message;
pub use role::{Role, RoleParseError};
