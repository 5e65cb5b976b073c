//! Output rendering for the chat view.
//!
//! This module provides the renderer trait the view drives and a plain-text
//! terminal implementation with optional ANSI styling.

use std::io::{self, Stdout, Write};

use pulldown_cmark::{Alignment, Event, Parser, Tag, TagEnd, TextMergeStream};
use unicode_width::UnicodeWidthStr;

use crate::markdown::FormatterOptions;
use crate::theme::Theme;
use crate::types::{Message, Role};
use crate::utils::time::format_clock;

/// ANSI escape code for dim text (used for the typing indicator and timestamps).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (assistant label on dark backgrounds).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for blue text (assistant label on light backgrounds).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for green text (user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (code).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for italic text (emphasis).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for underlined text (links).
const ANSI_UNDERLINE: &str = "\x1b[4m";

/// ANSI escape code for struck-through text.
const ANSI_STRIKE: &str = "\x1b[9m";

/// ANSI escape sequence returning to column zero and clearing the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Trait for rendering the chat view.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Render one message of the thread.
    ///
    /// `label` is the display name of the author.  Messages are rendered once
    /// each, in thread order, and their bodies are markdown.
    fn render_message(&mut self, label: &str, message: &Message);

    /// Show the typing indicator for `label`.
    fn show_typing(&mut self, label: &str);

    /// Hide the typing indicator.
    fn hide_typing(&mut self);

    /// Keep the most recent output in view.
    fn scroll_to_bottom(&mut self) {}

    /// Apply a new theme to subsequent output.
    fn set_theme(&mut self, theme: Theme) {
        _ = theme;
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout.  Message bodies are
/// formatted for the terminal with [`render_markdown`].
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    theme: Theme,
    typing: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            theme: Theme::default(),
            typing: false,
        }
    }

    /// Flushes stdout to ensure immediate display.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn label_color(&self, role: Role) -> &'static str {
        match (role, self.theme) {
            (Role::User, _) => ANSI_GREEN,
            (Role::Assistant, Theme::Dark) => ANSI_CYAN,
            (Role::Assistant, Theme::Light) => ANSI_BLUE,
        }
    }

    fn clear_typing(&mut self) {
        if self.typing {
            if self.use_color {
                print!("{ANSI_CLEAR_LINE}");
            } else {
                println!();
            }
            self.typing = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn render_message(&mut self, label: &str, message: &Message) {
        self.clear_typing();
        let clock = format_clock(message.timestamp);
        let provider = message
            .provider
            .as_deref()
            .map(|p| format!(" via {p}"))
            .unwrap_or_default();
        if self.use_color {
            let color = self.label_color(message.role);
            println!("{ANSI_BOLD}{color}{label}{ANSI_RESET} {ANSI_DIM}{clock}{provider}{ANSI_RESET}");
        } else {
            println!("{label} [{clock}{provider}]");
        }
        println!("{}", render_markdown(&message.content, self.use_color));
        println!();
        self.flush();
    }

    fn show_typing(&mut self, label: &str) {
        if self.typing {
            return;
        }
        if self.use_color {
            print!("{ANSI_DIM}{label} is typing...{ANSI_RESET}");
        } else {
            print!("{label} is typing...");
        }
        self.typing = true;
        self.flush();
    }

    fn hide_typing(&mut self) {
        self.clear_typing();
        self.flush();
    }

    fn scroll_to_bottom(&mut self) {
        self.flush();
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn print_error(&mut self, error: &str) {
        self.clear_typing();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.clear_typing();
        println!("{info}");
        self.flush();
    }
}

/// Formats markdown for a terminal.
///
/// Emphasis, code, and links become ANSI styles (or plain text when
/// `use_color` is false), lists get bullets or numbers, code blocks are
/// indented, and tables are drawn with box characters.  Parsing uses the same
/// extensions as [`crate::MarkdownFormatter`].
pub fn render_markdown(markdown: &str, use_color: bool) -> String {
    let options = FormatterOptions::default().parser_options();
    let mut writer = AnsiWriter::new(use_color);
    for event in TextMergeStream::new(Parser::new_ext(markdown, options)) {
        writer.event(event);
    }
    writer.out.trim_end().to_string()
}

struct PendingTable {
    alignments: Vec<Alignment>,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl PendingTable {
    fn new(alignments: Vec<Alignment>) -> Self {
        Self {
            alignments,
            header: Vec::new(),
            rows: Vec::new(),
            row: Vec::new(),
            cell: String::new(),
        }
    }

    fn draw(self, out: &mut String, use_color: bool) {
        let cols = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0usize; cols];
        for row in std::iter::once(&self.header).chain(self.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
            }
        }

        let border = |left: char, mid: char, right: char, horiz: char| {
            let mut line = String::new();
            line.push(left);
            for (i, width) in widths.iter().enumerate() {
                line.extend(std::iter::repeat_n(horiz, width + 2));
                line.push(if i + 1 < cols { mid } else { right });
            }
            line.push('\n');
            line
        };
        let row_line = |row: &[String], bold: bool| {
            let mut line = String::from("│");
            for (i, width) in widths.iter().enumerate() {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let pad = width - UnicodeWidthStr::width(cell);
                let (left, right) = match self.alignments.get(i) {
                    Some(Alignment::Right) => (pad, 0),
                    Some(Alignment::Center) => (pad / 2, pad - pad / 2),
                    _ => (0, pad),
                };
                line.push(' ');
                line.push_str(&" ".repeat(left));
                if bold && use_color {
                    line.push_str(&format!("{ANSI_BOLD}{cell}{ANSI_RESET}"));
                } else {
                    line.push_str(cell);
                }
                line.push_str(&" ".repeat(right));
                line.push_str(" │");
            }
            line.push('\n');
            line
        };

        out.push_str(&border('┌', '┬', '┐', '─'));
        out.push_str(&row_line(&self.header, true));
        out.push_str(&border('╞', '╪', '╡', '═'));
        for row in &self.rows {
            out.push_str(&row_line(row, false));
        }
        out.push_str(&border('└', '┴', '┘', '─'));
        out.push('\n');
    }
}

struct AnsiWriter {
    use_color: bool,
    out: String,
    styles: Vec<&'static str>,
    lists: Vec<Option<u64>>,
    links: Vec<(String, String)>,
    table: Option<PendingTable>,
    in_code_block: bool,
}

impl AnsiWriter {
    fn new(use_color: bool) -> Self {
        Self {
            use_color,
            out: String::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            table: None,
            in_code_block: false,
        }
    }

    fn push_style(&mut self, style: &'static str) {
        self.styles.push(style);
        if self.use_color && self.table.is_none() {
            self.out.push_str(style);
        }
    }

    fn pop_style(&mut self) {
        self.styles.pop();
        if self.use_color && self.table.is_none() {
            self.out.push_str(ANSI_RESET);
            for style in &self.styles {
                self.out.push_str(style);
            }
        }
    }

    fn text(&mut self, text: &str) {
        for (_, shown) in &mut self.links {
            shown.push_str(text);
        }
        match &mut self.table {
            Some(table) => table.cell.push_str(text),
            None => self.out.push_str(text),
        }
    }

    fn line_break(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code_block => {
                for line in text.lines() {
                    self.out.push_str("    ");
                    if self.use_color {
                        self.out.push_str(&format!("{ANSI_YELLOW}{line}{ANSI_RESET}"));
                    } else {
                        self.out.push_str(line);
                    }
                    self.out.push('\n');
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => self.text(&text),
            Event::Code(code) => {
                self.push_style(ANSI_YELLOW);
                self.text(&code);
                self.pop_style();
            }
            Event::SoftBreak | Event::HardBreak => match &mut self.table {
                Some(table) => table.cell.push(' '),
                None => self.out.push('\n'),
            },
            Event::Rule => {
                self.line_break();
                self.out.push_str("────────\n\n");
            }
            Event::TaskListMarker(checked) => self.text(if checked { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => self.push_style(ANSI_BOLD),
            Tag::Strong => self.push_style(ANSI_BOLD),
            Tag::Emphasis => self.push_style(ANSI_ITALIC),
            Tag::Strikethrough => self.push_style(ANSI_STRIKE),
            Tag::Link { dest_url, .. } => {
                self.links.push((dest_url.to_string(), String::new()));
                self.push_style(ANSI_UNDERLINE);
            }
            Tag::CodeBlock(_) => {
                self.line_break();
                self.in_code_block = true;
            }
            Tag::List(first) => {
                self.line_break();
                self.lists.push(first);
            }
            Tag::Item => {
                self.line_break();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("• "),
                }
            }
            Tag::Table(alignments) => {
                self.line_break();
                self.table = Some(PendingTable::new(alignments));
            }
            Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.out.push_str("\n\n");
            }
            TagEnd::Paragraph => {
                self.out.push('\n');
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::Link => {
                self.pop_style();
                if let Some((dest, shown)) = self.links.pop()
                    && !dest.is_empty()
                    && dest != shown
                {
                    self.text(&format!(" ({dest})"));
                }
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.out.push('\n');
            }
            TagEnd::Item => self.line_break(),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    table.draw(&mut self.out, self.use_color);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert_eq!(renderer.theme, Theme::Dark);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn assistant_color_follows_theme() {
        let mut renderer = PlainTextRenderer::new();
        assert_eq!(renderer.label_color(Role::Assistant), ANSI_CYAN);
        renderer.set_theme(Theme::Light);
        assert_eq!(renderer.label_color(Role::Assistant), ANSI_BLUE);
        assert_eq!(renderer.label_color(Role::User), ANSI_GREEN);
    }

    #[test]
    fn typing_indicator_toggles() {
        let mut renderer = PlainTextRenderer::with_color(false);
        renderer.show_typing("Assistant");
        assert!(renderer.typing);
        renderer.hide_typing();
        assert!(!renderer.typing);
    }

    #[test]
    fn markdown_inline_styles() {
        assert_eq!(render_markdown("**bold** and `code`", false), "bold and code");
        assert_eq!(
            render_markdown("**hi**", true),
            format!("{ANSI_BOLD}hi{ANSI_RESET}")
        );
        assert_eq!(
            render_markdown("**a _b_ c**", true),
            format!("{ANSI_BOLD}a {ANSI_ITALIC}b{ANSI_RESET}{ANSI_BOLD} c{ANSI_RESET}")
        );
    }

    #[test]
    fn markdown_blocks() {
        assert_eq!(render_markdown("# Title\n\nBody", false), "Title\n\nBody");
        assert_eq!(
            render_markdown("- one\n- two\n\n1. a\n2. b", false),
            "• one\n• two\n\n1. a\n2. b"
        );
        assert_eq!(
            render_markdown("Run:\n\n```\nlet x = 1;\nlet y = 2;\n```", false),
            "Run:\n\n    let x = 1;\n    let y = 2;"
        );
        assert_eq!(
            render_markdown("[docs](https://x.com) and <https://y.com>", false),
            "docs (https://x.com) and https://y.com"
        );
    }

    #[test]
    fn markdown_tables_are_drawn() {
        let table = render_markdown("| lang | kind |\n|---|--:|\n| Rust | systems |\n| C | old |", false);
        assert_eq!(
            table,
            "\
┌──────┬─────────┐
│ lang │    kind │
╞══════╪═════════╡
│ Rust │ systems │
│ C    │     old │
└──────┴─────────┘"
        );
    }

    #[test]
    fn markdown_tables_ignore_cell_styles() {
        let table = render_markdown("| **a** |\n|---|\n| `b` |", true);
        assert!(table.contains(&format!("│ {ANSI_BOLD}a{ANSI_RESET} │")), "{table}");
        assert!(table.contains("│ b │"), "{table}");
    }
}
