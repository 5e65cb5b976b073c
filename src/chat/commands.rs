//! Slash command parsing for the chat widget.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the widget without sending messages to the
//! backend.

use crate::theme::Theme;

/// A parsed chat command.
///
/// These commands control the widget and are not sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Switch theme.  `None` toggles between dark and light.
    Theme(Option<Theme>),

    /// Set or clear the provider requested on sends.
    Provider(Option<String>),

    /// Write the conversation to an HTML file.
    Export(String),

    /// Display thread statistics.
    Stats,

    /// Display help information.
    Help,

    /// Sign out and leave the chat.
    Logout,

    /// Exit without signing out.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chatwidget::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/theme light").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "theme" => match argument {
            None => ChatCommand::Theme(None),
            Some(arg) if arg.eq_ignore_ascii_case("toggle") => ChatCommand::Theme(None),
            Some(arg) => match arg.parse::<Theme>() {
                Ok(theme) => ChatCommand::Theme(Some(theme)),
                Err(_) => ChatCommand::Invalid("/theme expects 'dark' or 'light'".to_string()),
            },
        },
        "provider" => match argument {
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::Provider(None),
            Some(arg) => ChatCommand::Provider(Some(arg.to_string())),
            None => ChatCommand::Invalid(
                "/provider requires a provider name (or 'clear')".to_string(),
            ),
        },
        "export" => match argument {
            Some(arg) => ChatCommand::Export(arg.to_string()),
            None => ChatCommand::Invalid("/export requires a file path".to_string()),
        },
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        "logout" | "signout" => ChatCommand::Logout,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /theme [dark|light]    Switch theme (no argument toggles)
  /provider <name>       Route messages to a provider (or 'clear')
  /export <file>         Save the conversation as an HTML page
  /stats                 Show conversation statistics
  /logout                Sign out and exit
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_logout() {
        assert_eq!(parse_command("/logout"), Some(ChatCommand::Logout));
        assert_eq!(parse_command("/LOGOUT"), Some(ChatCommand::Logout));
    }

    #[test]
    fn parse_theme() {
        assert_eq!(parse_command("/theme"), Some(ChatCommand::Theme(None)));
        assert_eq!(parse_command("/theme toggle"), Some(ChatCommand::Theme(None)));
        assert_eq!(
            parse_command("/theme light"),
            Some(ChatCommand::Theme(Some(Theme::Light)))
        );
        assert_eq!(
            parse_command("/theme  DARK "),
            Some(ChatCommand::Theme(Some(Theme::Dark)))
        );
        assert!(matches!(
            parse_command("/theme sepia"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
    }

    #[test]
    fn parse_provider() {
        assert_eq!(
            parse_command("/provider openai"),
            Some(ChatCommand::Provider(Some("openai".to_string())))
        );
        assert_eq!(
            parse_command("/provider clear"),
            Some(ChatCommand::Provider(None))
        );
        assert!(matches!(
            parse_command("/provider"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_export() {
        assert_eq!(
            parse_command("/export chat.html"),
            Some(ChatCommand::Export("chat.html".to_string()))
        );
        assert_eq!(
            parse_command("/export"),
            Some(ChatCommand::Invalid("/export requires a file path".to_string()))
        );
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            parse_command("/model gpt"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("a/b"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/logout"));
        assert!(help.contains("/theme"));
        assert!(help.contains("/export"));
    }
}
