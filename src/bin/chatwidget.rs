//! Interactive terminal host for the chat widget.
//!
//! This binary mounts a [`ChatView`] on a plain-text renderer and feeds it
//! lines read with rustyline.  Theme and sign-in state persist in a small
//! JSON preferences file.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the local development backend
//! chatwidget
//!
//! # Brand the widget and point it at another backend
//! chatwidget --brand Acme --base-url https://chat.example.com/api/
//!
//! # Route messages to a named provider
//! chatwidget --provider openai
//!
//! # Disable colors (useful for piping output)
//! chatwidget --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/theme [dark|light]` - Switch theme
//! - `/provider <name>` - Route messages to a provider
//! - `/export <file>` - Save the conversation as HTML
//! - `/stats` - Show conversation statistics
//! - `/logout` - Sign out and exit
//! - `/quit` - Exit the application

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use chatwidget::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatView, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use chatwidget::{
    ApiClient, AuthSession, ChatStore, FileStorage, MemoryStorage, RemoteChatService, Rejection,
    Role, SendOutcome, Storage, ThemeStore,
};

/// Main entry point for the chatwidget application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let (args, _) = ChatArgs::from_command_line_relaxed("chatwidget [OPTIONS]");
    let config = ChatConfig::from(args);

    let storage = open_storage(&config);
    let auth = AuthSession::new(storage.clone());
    auth.login()?;
    let theme = Arc::new(ThemeStore::load(storage));

    let client = ApiClient::with_options(config.base_url.clone(), None, Some(config.timeout))?;
    let base_url = client.base_url().to_string();
    let store = Arc::new(
        ChatStore::new(RemoteChatService::new(client)).with_provider(config.provider.clone()),
    );
    let mut view = ChatView::new(store.clone(), theme, auth, &config);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    println!("{} (backend: {})", view.brand(), base_url);
    println!("Type /help for commands, /quit to exit\n");
    view.mount(&mut renderer);

    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Logout => {
                            match view.logout() {
                                Ok(()) => println!("Signed out. Goodbye!"),
                                Err(err) => {
                                    renderer.print_error(&format!("Failed to sign out: {}", err))
                                }
                            }
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Theme(choice) => {
                            let result = match choice {
                                Some(theme) => view.set_theme(theme, &mut renderer).map(|_| theme),
                                None => view.toggle_theme(&mut renderer),
                            };
                            match result {
                                Ok(theme) => renderer.print_info(&format!("Theme set to {theme}")),
                                Err(err) => renderer
                                    .print_error(&format!("Failed to save theme: {}", err)),
                            }
                        }
                        ChatCommand::Provider(provider) => {
                            store.set_provider(provider.clone());
                            match provider {
                                Some(p) => renderer.print_info(&format!("Provider set to: {}", p)),
                                None => renderer.print_info("Provider cleared."),
                            }
                        }
                        ChatCommand::Export(path) => match view.export_html(&path) {
                            Ok(()) => {
                                renderer.print_info(&format!("Conversation saved to {}", path))
                            }
                            Err(err) => renderer
                                .print_error(&format!("Failed to export conversation: {}", err)),
                        },
                        ChatCommand::Stats => print_stats(&view, &base_url),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                view.set_input(line);
                match view.submit(&mut renderer).await {
                    Some(SendOutcome::Failed(err)) => log::debug!("exchange failed: {err}"),
                    Some(SendOutcome::Rejected(Rejection::Busy)) => {
                        renderer.print_error("Still waiting for the previous reply.")
                    }
                    Some(_) | None => {}
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn open_storage(config: &ChatConfig) -> Arc<dyn Storage> {
    let path = config.storage_path.clone().or_else(FileStorage::default_path);
    match path.map(FileStorage::open) {
        Some(Ok(storage)) => Arc::new(storage),
        Some(Err(err)) => {
            log::warn!("preferences unavailable, using memory: {err}");
            Arc::new(MemoryStorage::new())
        }
        None => Arc::new(MemoryStorage::new()),
    }
}

fn print_stats(view: &ChatView<RemoteChatService>, base_url: &str) {
    let store = view.store();
    let messages = store.messages();
    let user = messages.iter().filter(|m| m.role == Role::User).count();
    println!("    Conversation Statistics:");
    println!("      Backend: {}", base_url);
    println!(
        "      Provider: {}",
        store.provider().as_deref().unwrap_or("(backend default)")
    );
    println!("      Theme: {}", view.theme());
    println!("      Messages: {}", messages.len());
    println!("      From you: {}", user);
    println!("      From {}: {}", view.brand(), messages.len() - user);
}
