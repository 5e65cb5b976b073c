//! The chat view.
//!
//! `ChatView` binds a [`ChatStore`] to a [`Renderer`]: it renders each new
//! message once, shows the typing indicator while the store is waiting, keeps
//! the output scrolled to the bottom, and owns the input composer.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::auth::AuthSession;
use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::markdown::MarkdownFormatter;
use crate::render::Renderer;
use crate::service::ChatService;
use crate::store::{ChatStore, SendOutcome};
use crate::theme::{Theme, ThemeStore};
use crate::types::{Message, Role};

/// Label shown for the user's own messages.
const USER_LABEL: &str = "You";

/// A key press delivered to the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// Enter, with or without Shift held.
    Enter {
        /// Whether Shift was held.
        shift: bool,
    },
    /// Delete the last character.
    Backspace,
}

/// What the user can currently do, derived from the composer and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Nothing typed and nothing in flight.
    Idle,
    /// Text in the composer, ready to send.
    Composing,
    /// An exchange is in flight; input is disabled.
    Sending,
}

/// Decides when the view should jump to the newest output.
///
/// A scroll is due whenever the thread grew since the last observation or the
/// waiting flag turned on.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoScroll {
    last_len: usize,
    last_waiting: bool,
}

impl AutoScroll {
    /// Records the current thread length and waiting flag, returning true if
    /// the view should scroll to the bottom.
    pub fn observe(&mut self, len: usize, waiting: bool) -> bool {
        let grew = len > self.last_len;
        let started_waiting = waiting && !self.last_waiting;
        self.last_len = len;
        self.last_waiting = waiting;
        grew || started_waiting
    }
}

/// The chat view for one conversation.
pub struct ChatView<S: ChatService> {
    store: Arc<ChatStore<S>>,
    theme: Arc<ThemeStore>,
    auth: AuthSession,
    formatter: MarkdownFormatter,
    brand: String,
    greeting: String,
    input: String,
    rendered: usize,
    typing_shown: bool,
    scroll: AutoScroll,
}

impl<S: ChatService> ChatView<S> {
    /// Creates a view over `store`.
    pub fn new(
        store: Arc<ChatStore<S>>,
        theme: Arc<ThemeStore>,
        auth: AuthSession,
        config: &ChatConfig,
    ) -> Self {
        Self {
            store,
            theme,
            auth,
            formatter: MarkdownFormatter::new(),
            brand: config.brand.clone(),
            greeting: config.greeting.clone(),
            input: String::new(),
            rendered: 0,
            typing_shown: false,
            scroll: AutoScroll::default(),
        }
    }

    /// Replaces the markdown formatter.
    pub fn with_formatter(mut self, formatter: MarkdownFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Seeds the greeting into an empty thread and renders everything.
    pub fn mount(&mut self, renderer: &mut dyn Renderer) {
        self.store.seed_greeting(&self.greeting);
        renderer.set_theme(self.theme.theme());
        self.sync(renderer);
    }

    /// Brings the renderer up to date with the store.
    ///
    /// Each message appended since the last sync is rendered once.  The
    /// typing indicator follows the waiting flag, and the view scrolls when
    /// [`AutoScroll`] says so.
    pub fn sync(&mut self, renderer: &mut dyn Renderer) {
        let waiting = self.store.is_waiting();
        if self.typing_shown && !waiting {
            renderer.hide_typing();
            self.typing_shown = false;
        }
        for message in self.store.messages_since(self.rendered) {
            if self.typing_shown {
                renderer.hide_typing();
                self.typing_shown = false;
            }
            renderer.render_message(self.label_for(message.role), &message);
            self.rendered += 1;
        }
        if waiting && !self.typing_shown {
            renderer.show_typing(&self.brand);
            self.typing_shown = true;
        }
        if self.scroll.observe(self.rendered, waiting) {
            renderer.scroll_to_bottom();
        }
    }

    /// Feeds one key press to the composer.
    ///
    /// Enter without Shift submits; the returned text is what the caller
    /// should pass to [`ChatView::send`].  Shift+Enter inserts a newline.
    pub fn handle_key(&mut self, key: Key) -> Option<String> {
        match key {
            Key::Char(c) => {
                self.input.push(c);
                None
            }
            Key::Enter { shift: true } => {
                self.input.push('\n');
                None
            }
            Key::Enter { shift: false } => self.take_submission(),
            Key::Backspace => {
                self.input.pop();
                None
            }
        }
    }

    /// Replaces the composer contents.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Returns the composer contents.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns true if the composer holds sendable text and nothing is in
    /// flight.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty() && !self.store.is_waiting()
    }

    /// Takes the composer contents for sending, or returns `None` (leaving
    /// the composer untouched) if [`ChatView::can_submit`] is false.
    pub fn take_submission(&mut self) -> Option<String> {
        if !self.can_submit() {
            return None;
        }
        Some(std::mem::take(&mut self.input))
    }

    /// Submits the composer contents.
    ///
    /// Returns `None` without touching the thread when the composer is blank
    /// or an exchange is already in flight.
    pub async fn submit(&mut self, renderer: &mut dyn Renderer) -> Option<SendOutcome> {
        let text = self.take_submission()?;
        Some(self.send(&text, renderer).await)
    }

    /// Sends `text` through the store, rendering the user message and the
    /// typing indicator before the reply arrives.
    pub async fn send(&mut self, text: &str, renderer: &mut dyn Renderer) -> SendOutcome {
        let store = self.store.clone();
        let exchange = match store.begin(text) {
            Ok(exchange) => exchange,
            Err(rejection) => return SendOutcome::Rejected(rejection),
        };
        self.sync(renderer);
        let outcome = exchange.complete().await;
        self.sync(renderer);
        outcome
    }

    /// Returns the current interaction state.
    pub fn state(&self) -> ViewState {
        if self.store.is_waiting() {
            ViewState::Sending
        } else if self.input.trim().is_empty() {
            ViewState::Idle
        } else {
            ViewState::Composing
        }
    }

    /// Returns true while the typing indicator should be visible.
    pub fn typing_visible(&self) -> bool {
        self.store.is_waiting()
    }

    /// Returns the store behind the view.
    pub fn store(&self) -> &Arc<ChatStore<S>> {
        &self.store
    }

    /// Returns the brand name.
    pub fn brand(&self) -> &str {
        &self.brand
    }

    /// Returns the current theme.
    pub fn theme(&self) -> Theme {
        self.theme.theme()
    }

    /// Switches theme and restyles the renderer.
    pub fn set_theme(&mut self, theme: Theme, renderer: &mut dyn Renderer) -> Result<()> {
        self.theme.set(theme)?;
        renderer.set_theme(theme);
        Ok(())
    }

    /// Toggles between dark and light, returning the new theme.
    pub fn toggle_theme(&mut self, renderer: &mut dyn Renderer) -> Result<Theme> {
        let theme = self.theme.toggle()?;
        renderer.set_theme(theme);
        Ok(theme)
    }

    /// Clears the persisted authentication flag.  The host is expected to
    /// leave the chat afterwards.
    pub fn logout(&mut self) -> Result<()> {
        self.auth.logout()
    }

    /// Renders one message body to HTML.
    pub fn render_body(&self, message: &Message) -> String {
        self.formatter.render(&message.content)
    }

    /// Renders the whole thread as a self-contained HTML page.
    pub fn render_html_page(&self) -> String {
        let theme = self.theme.theme();
        let title = escape_html(&self.brand);
        let mut body = String::new();
        for message in self.store.messages() {
            let label = escape_html(self.label_for(message.role));
            let provider = message
                .provider
                .as_deref()
                .map(|p| format!("<span class=\"provider\">{}</span>", escape_html(p)))
                .unwrap_or_default();
            body.push_str(&format!(
                "<div class=\"message {role}\" data-key=\"{key}\">\n\
                 <div class=\"meta\"><span class=\"author\">{label}</span>{provider}</div>\n\
                 <div class=\"body\">\n{html}</div>\n\
                 </div>\n",
                role = message.role,
                key = message.render_key(),
                html = self.render_body(&message),
            ));
        }
        if self.store.is_waiting() {
            body.push_str(&format!(
                "<div class=\"typing\">{title} is typing</div>\n"
            ));
        }
        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box}}
body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;line-height:1.5}}
body.dark{{background:#1e1e1e;color:#d4d4d4}}
body.light{{background:#ffffff;color:#1f2328}}
.header{{padding:16px 20px;font-weight:600;border-bottom:1px solid #8884}}
.messages{{padding:20px;display:flex;flex-direction:column;gap:12px;max-width:900px;margin:0 auto}}
.message{{max-width:85%;padding:10px 14px;border-radius:12px;overflow-wrap:anywhere}}
.message.user{{align-self:flex-end;background:#2f81f733}}
.message.assistant{{align-self:flex-start;background:#8882}}
.meta{{font-size:12px;opacity:.7;margin-bottom:4px;display:flex;gap:8px}}
.body p,.body ul,.body ol,.body pre{{margin:6px 0}}
.body pre{{overflow-x:auto;padding:8px;border-radius:6px;background:#0003}}
.{container}{{overflow-x:auto;max-width:100%}}
.{container} table{{border-collapse:collapse}}
.{container} th,.{container} td{{border:1px solid #8886;padding:4px 8px;white-space:nowrap}}
.typing{{opacity:.6;font-style:italic}}
</style>
</head>
<body class="{theme}">
<div class="header">{title}</div>
<div class="messages">
{body}</div>
</body>
</html>
"##,
            container = crate::markdown::TABLE_CONTAINER_CLASS,
        )
    }

    /// Writes [`ChatView::render_html_page`] to `path`.
    pub fn export_html<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.render_html_page())
            .map_err(|err| Error::io("failed to write HTML export", err))
    }

    fn label_for(&self, role: Role) -> &str {
        match role {
            Role::User => USER_LABEL,
            Role::Assistant => &self.brand,
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
