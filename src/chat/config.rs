//! Configuration types for the chat widget.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for branding and connecting the widget.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

/// Default brand shown as the assistant's name.
const DEFAULT_BRAND: &str = "Assistant";

/// Default greeting seeded into an empty thread.
const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the chatwidget tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the chat backend.
    #[arrrg(optional, "Chat backend base URL (default: $CHATWIDGET_BASE_URL)", "URL")]
    pub base_url: Option<String>,

    /// Provider to request replies from.
    #[arrrg(optional, "Provider to route messages to", "PROVIDER")]
    pub provider: Option<String>,

    /// Brand name shown for the assistant.
    #[arrrg(optional, "Brand name shown for the assistant (default: Assistant)", "NAME")]
    pub brand: Option<String>,

    /// Greeting seeded into an empty conversation.
    #[arrrg(optional, "Greeting shown when the conversation starts", "TEXT")]
    pub greeting: Option<String>,

    /// Per-request timeout.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Location of the preferences file.
    #[arrrg(optional, "Preferences file (default: config dir)", "PATH")]
    pub storage: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat widget.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Display name of the assistant.
    pub brand: String,

    /// Assistant message seeded into an empty thread on mount.
    pub greeting: String,

    /// Base URL of the chat backend; `None` defers to the client's default.
    pub base_url: Option<String>,

    /// Provider requested on every send.
    pub provider: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Preferences file; `None` uses the platform config directory.
    pub storage_path: Option<PathBuf>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Brand: Assistant
    /// - Greeting: "Hello! How can I help you today?"
    /// - Timeout: 60 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            base_url: None,
            provider: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            storage_path: None,
            use_color: true,
        }
    }

    /// Sets the brand name.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    /// Sets the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the provider.
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the preferences file.
    pub fn with_storage_path(mut self, path: Option<PathBuf>) -> Self {
        self.storage_path = path;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            brand: args
                .brand
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(defaults.brand),
            greeting: args
                .greeting
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(defaults.greeting),
            base_url: args.base_url,
            provider: args.provider.filter(|p| !p.trim().is_empty()),
            timeout: args
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            storage_path: args.storage.map(PathBuf::from),
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.brand, "Assistant");
        assert_eq!(config.greeting, "Hello! How can I help you today?");
        assert!(config.base_url.is_none());
        assert!(config.provider.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.storage_path.is_none());
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            base_url: Some("https://chat.example.com/api".to_string()),
            provider: Some("anthropic".to_string()),
            brand: Some("Acme Helper".to_string()),
            greeting: Some("Welcome to Acme!".to_string()),
            timeout_secs: Some(15),
            storage: Some("/tmp/chatwidget.json".to_string()),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.brand, "Acme Helper");
        assert_eq!(config.greeting, "Welcome to Acme!");
        assert_eq!(
            config.base_url.as_deref(),
            Some("https://chat.example.com/api")
        );
        assert_eq!(config.provider.as_deref(), Some("anthropic"));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(
            config.storage_path,
            Some(PathBuf::from("/tmp/chatwidget.json"))
        );
        assert!(!config.use_color);
    }

    #[test]
    fn blank_and_zero_args_fall_back() {
        let args = ChatArgs {
            brand: Some("  ".to_string()),
            provider: Some(String::new()),
            timeout_secs: Some(0),
            ..ChatArgs::default()
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.brand, "Assistant");
        assert!(config.provider.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_brand("Acme")
            .with_greeting("Hi")
            .with_base_url(Some("http://localhost:8080".to_string()))
            .with_provider(Some("local".to_string()))
            .with_timeout(Duration::from_secs(5))
            .with_storage_path(Some(PathBuf::from("prefs.json")))
            .without_color();
        assert_eq!(config.brand, "Acme");
        assert_eq!(config.greeting, "Hi");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.provider.as_deref(), Some("local"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.storage_path, Some(PathBuf::from("prefs.json")));
        assert!(!config.use_color);
    }
}
