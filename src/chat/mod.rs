//! The chat widget front end.
//!
//! This module binds the chat store to something a user can drive: a view
//! that renders the thread and owns the composer, slash commands for the
//! terminal host, and configuration resolved from the command line.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`view`]: rendering the thread, the typing indicator, and the composer
//! - [`commands`]: slash command parsing and help text

mod commands;
mod config;
mod view;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use view::{AutoScroll, ChatView, Key, ViewState};
