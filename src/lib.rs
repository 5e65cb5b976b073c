// Public modules
pub mod auth;
pub mod chat;
pub mod client;
pub mod error;
pub mod markdown;
pub mod observability;
pub mod render;
pub mod service;
pub mod storage;
pub mod store;
pub mod theme;
pub mod types;
pub mod utils;

// Re-exports
pub use auth::AuthSession;
pub use client::ApiClient;
pub use error::{Error, Result};
pub use markdown::{EventHook, FormatterOptions, MarkdownFormatter, TableWrap};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer, render_markdown};
pub use service::{ChatService, RemoteChatService};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{ChatStore, ERROR_MESSAGE, Exchange, Rejection, SendOutcome, WaitingFlag};
pub use theme::{Theme, ThemeStore};
pub use types::*;
