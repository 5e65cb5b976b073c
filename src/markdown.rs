//! Markdown to HTML rendering for message bodies.
//!
//! Formatting is delegated to `pulldown-cmark`.  On top of it the formatter
//! autolinks bare URLs, optionally turns soft breaks into `<br />`, and runs
//! the event stream through a chain of [`EventHook`]s before emitting HTML.
//! The default chain holds a single hook, [`TableWrap`], which wraps every
//! table in a horizontally scrollable container.

use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;

use crate::observability::{MARKDOWN_RENDERS, MARKDOWN_TABLES_WRAPPED};

/// CSS class of the element wrapped around rendered tables.
pub const TABLE_CONTAINER_CLASS: &str = "table-container";

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"]*[^\s<>".,:;'!?)\]]"#)
        .expect("URL pattern is valid")
});

/// A rewrite step applied to the parsed event stream.
///
/// Hooks see every event in document order and push whatever should replace
/// it onto `out`: the event itself, nothing, or additional events around it.
/// Hooks must be pure so that rendering stays a function of the input.
pub trait EventHook: Send + Sync {
    /// Rewrite one event.
    fn on_event<'a>(&self, event: Event<'a>, out: &mut Vec<Event<'a>>);
}

/// Wraps each table in `<div class="table-container">`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableWrap;

impl EventHook for TableWrap {
    fn on_event<'a>(&self, event: Event<'a>, out: &mut Vec<Event<'a>>) {
        match event {
            Event::Start(Tag::Table(_)) => {
                MARKDOWN_TABLES_WRAPPED.click();
                out.push(Event::Html(CowStr::Borrowed(
                    "<div class=\"table-container\">\n",
                )));
                out.push(event);
            }
            Event::End(TagEnd::Table) => {
                out.push(event);
                out.push(Event::Html(CowStr::Borrowed("</div>\n")));
            }
            event => out.push(event),
        }
    }
}

/// Switches for the formatter's behavior on top of CommonMark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatterOptions {
    /// Render single newlines inside a paragraph as `<br />`.
    pub breaks: bool,
    /// Turn bare `http(s)://` and `www.` URLs into links.
    pub autolink: bool,
    /// Replace straight quotes, `--`, and `...` with typographic forms.
    pub smart_punctuation: bool,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            breaks: true,
            autolink: true,
            smart_punctuation: true,
        }
    }
}

impl FormatterOptions {
    pub(crate) fn parser_options(&self) -> Options {
        let mut options =
            Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        if self.smart_punctuation {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        options
    }
}

/// Renders message markdown to HTML.
pub struct MarkdownFormatter {
    options: FormatterOptions,
    hooks: Vec<Box<dyn EventHook>>,
}

impl MarkdownFormatter {
    /// Creates the standard formatter: default options and [`TableWrap`].
    pub fn new() -> Self {
        Self::bare(FormatterOptions::default()).with_hook(TableWrap)
    }

    /// Creates a formatter with the given options and no hooks.
    pub fn bare(options: FormatterOptions) -> Self {
        Self {
            options,
            hooks: Vec::new(),
        }
    }

    /// Appends a hook to the end of the chain.
    pub fn with_hook(mut self, hook: impl EventHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Returns the formatter's options.
    pub fn options(&self) -> FormatterOptions {
        self.options
    }

    /// Renders `markdown` to an HTML fragment.
    pub fn render(&self, markdown: &str) -> String {
        MARKDOWN_RENDERS.click();
        let parser = TextMergeStream::new(Parser::new_ext(
            markdown,
            self.options.parser_options(),
        ));

        let mut events = Vec::new();
        let mut link_depth = 0usize;
        let mut html_anchor_depth = 0usize;
        let mut in_code_block = false;
        for event in parser {
            match event {
                Event::Start(Tag::Link { .. }) => {
                    link_depth += 1;
                    events.push(event);
                }
                Event::End(TagEnd::Link) => {
                    link_depth = link_depth.saturating_sub(1);
                    events.push(event);
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    in_code_block = true;
                    events.push(event);
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    events.push(event);
                }
                Event::InlineHtml(ref html) => {
                    if opens_anchor(html) {
                        html_anchor_depth += 1;
                    } else if closes_anchor(html) {
                        html_anchor_depth = html_anchor_depth.saturating_sub(1);
                    }
                    events.push(event);
                }
                Event::End(TagEnd::Paragraph) => {
                    html_anchor_depth = 0;
                    events.push(event);
                }
                Event::SoftBreak if self.options.breaks => events.push(Event::HardBreak),
                Event::Text(text)
                    if self.options.autolink
                        && link_depth == 0
                        && html_anchor_depth == 0
                        && !in_code_block =>
                {
                    autolink(text, &mut events);
                }
                event => events.push(event),
            }
        }

        for hook in &self.hooks {
            let mut rewritten = Vec::with_capacity(events.len());
            for event in events {
                hook.on_event(event, &mut rewritten);
            }
            events = rewritten;
        }

        let mut html = String::with_capacity(markdown.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html, events.into_iter());
        html
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn opens_anchor(html: &str) -> bool {
    let tag = html.trim_start().as_bytes();
    tag.len() >= 3
        && tag[0] == b'<'
        && tag[1].eq_ignore_ascii_case(&b'a')
        && (tag[2].is_ascii_whitespace() || tag[2] == b'>')
}

fn closes_anchor(html: &str) -> bool {
    let tag = html.trim_start().as_bytes();
    tag.len() >= 4
        && tag.starts_with(b"</")
        && tag[2].eq_ignore_ascii_case(&b'a')
        && (tag[3].is_ascii_whitespace() || tag[3] == b'>')
}

/// Extend a URL match over closing parentheses that balance ones inside it.
fn balanced_end(text: &str, start: usize, mut end: usize) -> usize {
    while text[end..].starts_with(')') {
        let url = &text[start..end];
        if url.matches('(').count() <= url.matches(')').count() {
            break;
        }
        end += 1;
    }
    end
}

/// Split a text event around the URLs it contains.
fn autolink<'a>(text: CowStr<'a>, out: &mut Vec<Event<'a>>) {
    if !URL.is_match(&text) {
        out.push(Event::Text(text));
        return;
    }
    let text = text.into_string();
    let mut last = 0;
    for found in URL.find_iter(&text) {
        if found.start() < last {
            continue;
        }
        if found.start() > last {
            out.push(Event::Text(text[last..found.start()].to_string().into()));
        }
        let end = balanced_end(&text, found.start(), found.end());
        let shown = &text[found.start()..end];
        let dest = if shown.len() >= 4 && shown[..4].eq_ignore_ascii_case("www.") {
            format!("http://{shown}")
        } else {
            shown.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: dest.into(),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(shown.to_string().into()));
        out.push(Event::End(TagEnd::Link));
        last = end;
    }
    if last < text.len() {
        out.push(Event::Text(text[last..].to_string().into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE_TABLE: &str = "\
| a | b | c | d | e | f | g | h |
|---|---|---|---|---|---|---|---|
| 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 |
| 9 | 10 | 11 | 12 | 13 | 14 | 15 | 16 |
";

    #[test]
    fn table_is_wrapped_once() {
        let formatter = MarkdownFormatter::new();
        for input in [
            "| x |\n|---|\n| 1 |\n",
            WIDE_TABLE,
            "Intro text.\n\n| name | value |\n|:-----|------:|\n| a | 1 |\n\nOutro.",
        ] {
            let html = formatter.render(input);
            assert_eq!(html.matches("<div class=\"table-container\">").count(), 1);
            assert_eq!(html.matches("<table>").count(), 1);
            assert_eq!(html.matches("</div>").count(), 1);

            let open = html.find("<div class=\"table-container\">").unwrap();
            let table = html.find("<table>").unwrap();
            let table_end = html.find("</table>").unwrap();
            let close = html.find("</div>").unwrap();
            assert!(open < table && table < table_end && table_end < close, "{html}");
        }
    }

    #[test]
    fn each_table_gets_its_own_container() {
        let input = format!("{WIDE_TABLE}\nbetween\n\n{WIDE_TABLE}");
        let html = MarkdownFormatter::new().render(&input);
        assert_eq!(html.matches("<div class=\"table-container\">").count(), 2);
        assert_eq!(html.matches("<table>").count(), 2);
    }

    #[test]
    fn bare_formatter_does_not_wrap() {
        let html = MarkdownFormatter::bare(FormatterOptions::default()).render(WIDE_TABLE);
        assert!(html.contains("<table>"));
        assert!(!html.contains(TABLE_CONTAINER_CLASS));
    }

    #[test]
    fn rendering_is_deterministic() {
        let formatter = MarkdownFormatter::new();
        let input = "# Title\n\nSome *emphasis*, a [link](https://example.com), and\n\n```rust\nfn main() {}\n```\n\n";
        assert_eq!(formatter.render(input), formatter.render(input));
        let again = MarkdownFormatter::new();
        assert_eq!(formatter.render(WIDE_TABLE), again.render(WIDE_TABLE));
    }

    #[test]
    fn standard_formatting() {
        let html = MarkdownFormatter::new().render("**bold** and _em_\n\n- one\n- two\n");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>em</em>"));
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>one</li>"));
    }

    #[test]
    fn code_blocks_are_escaped() {
        let html = MarkdownFormatter::new().render("```\nlet x = a < b;\n```\n");
        assert!(html.contains("<pre><code>"));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn raw_html_passes_through() {
        let html = MarkdownFormatter::new().render("before <kbd>Ctrl</kbd> after");
        assert!(html.contains("<kbd>Ctrl</kbd>"));
    }

    #[test]
    fn bare_urls_are_linked() {
        let html = MarkdownFormatter::new().render("See https://example.com/docs. Or www.rust-lang.org");
        assert!(html.contains("<a href=\"https://example.com/docs\">https://example.com/docs</a>."));
        assert!(html.contains("<a href=\"http://www.rust-lang.org\">www.rust-lang.org</a>"));
    }

    #[test]
    fn urls_in_code_and_links_are_left_alone() {
        let formatter = MarkdownFormatter::new();
        let html = formatter.render("`https://example.com`");
        assert!(!html.contains("<a "));

        let html = formatter.render("```\nhttps://example.com\n```");
        assert!(!html.contains("<a "));

        let html = formatter.render("[https://example.com](https://example.org)");
        assert_eq!(html.matches("<a ").count(), 1);
        assert!(html.contains("href=\"https://example.org\""));
    }

    #[test]
    fn urls_inside_inline_anchors_are_left_alone() {
        let formatter = MarkdownFormatter::new();
        let html = formatter.render("see <a href=\"https://x.com\">https://x.com</a> now");
        assert_eq!(html.matches("<a ").count(), 1, "{html}");
        assert!(html.contains("<a href=\"https://x.com\">https://x.com</a> now"));

        let html = formatter.render("<A HREF=\"https://x.com\">x</A> then https://y.com");
        assert_eq!(html.matches("<a ").count(), 1, "{html}");
        assert!(html.contains("<a href=\"https://y.com\">https://y.com</a>"));

        let html = formatter.render("<abbr title=\"x\">https://z.com</abbr>");
        assert!(html.contains("<a href=\"https://z.com\">https://z.com</a>"), "{html}");
    }

    #[test]
    fn balanced_parentheses_stay_in_the_url() {
        let html = MarkdownFormatter::new()
            .render("Read https://en.wikipedia.org/wiki/Rust_(programming_language) today");
        assert!(html.contains(
            "<a href=\"https://en.wikipedia.org/wiki/Rust_(programming_language)\">\
             https://en.wikipedia.org/wiki/Rust_(programming_language)</a> today"
        ), "{html}");

        let html = MarkdownFormatter::new().render("(see https://example.com/docs)");
        assert!(html.contains("<a href=\"https://example.com/docs\">https://example.com/docs</a>)"), "{html}");
    }

    #[test]
    fn soft_breaks_become_line_breaks() {
        let html = MarkdownFormatter::new().render("line one\nline two");
        assert!(html.contains("line one<br />"));

        let options = FormatterOptions {
            breaks: false,
            ..FormatterOptions::default()
        };
        let html = MarkdownFormatter::bare(options).render("line one\nline two");
        assert!(!html.contains("<br"));
    }

    #[test]
    fn smart_punctuation() {
        let html = MarkdownFormatter::new().render("\"quoted\" -- it's...");
        assert!(html.contains('\u{201c}'));
        assert!(html.contains('\u{2013}'));
        assert!(html.contains('\u{2026}'));

        let options = FormatterOptions {
            smart_punctuation: false,
            ..FormatterOptions::default()
        };
        let html = MarkdownFormatter::bare(options).render("\"quoted\"");
        assert!(!html.contains('\u{201c}'));
        assert!(html.contains("quoted"));
    }

    #[test]
    fn custom_hooks_run_in_order() {
        struct Shout;
        impl EventHook for Shout {
            fn on_event<'a>(&self, event: Event<'a>, out: &mut Vec<Event<'a>>) {
                match event {
                    Event::Text(text) => out.push(Event::Text(text.to_uppercase().into())),
                    event => out.push(event),
                }
            }
        }
        let html = MarkdownFormatter::new().with_hook(Shout).render("quiet");
        assert_eq!(html, "<p>QUIET</p>\n");
    }
}
