//! Markdown to display tree.
//!
//! Message bodies are rendered into a flat list of blocks: fenced or
//! indented code, and paragraphs of inline runs. Headings, list items,
//! quotes and table rows all collapse into paragraphs.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;

/// Language tag used when a code block does not name one.
pub const DEFAULT_LANGUAGE: &str = "plaintext";

/// Top-level display element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Run of inline content.
    Paragraph {
        /// Inline runs in reading order.
        inlines: Vec<Inline>,
    },
    /// Preformatted code.
    Code {
        /// Language tag, `plaintext` when absent.
        language: String,
        /// Source text with one trailing newline removed.
        code: String,
    },
}

/// Inline display element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inline {
    /// Plain text.
    Text {
        /// Text content.
        text: String,
    },
    /// Inline code span.
    Code {
        /// Code content.
        code: String,
    },
    /// Hyperlink.
    Link {
        /// Target URL.
        href: String,
        /// Visible text.
        text: String,
    },
}

impl Inline {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    link: Option<(String, String)>,
    code: Option<(String, String)>,
}

impl Builder {
    fn push_text(&mut self, text: &str) {
        if let Some((_, link_text)) = self.link.as_mut() {
            link_text.push_str(text);
            return;
        }
        if let Some(Inline::Text { text: last }) = self.inlines.last_mut() {
            last.push_str(text);
        } else {
            self.inlines.push(Inline::text(text));
        }
    }

    fn push_code_span(&mut self, code: &str) {
        if let Some((_, link_text)) = self.link.as_mut() {
            link_text.push_str(code);
        } else {
            self.inlines.push(Inline::Code {
                code: code.to_string(),
            });
        }
    }

    fn flush_paragraph(&mut self) {
        if let Some((href, text)) = self.link.take() {
            self.inlines.push(Inline::Link { href, text });
        }
        if let Some(Inline::Text { text }) = self.inlines.last_mut() {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
            if text.is_empty() {
                self.inlines.pop();
            }
        }
        if !self.inlines.is_empty() {
            let inlines = std::mem::take(&mut self.inlines);
            self.blocks.push(Block::Paragraph { inlines });
        }
    }

    fn finish_code(&mut self) {
        if let Some((language, mut code)) = self.code.take() {
            if code.ends_with('\n') {
                code.pop();
            }
            self.blocks.push(Block::Code { language, code });
        }
    }
}

fn language_of(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split_whitespace()
            .next()
            .map_or_else(|| DEFAULT_LANGUAGE.to_string(), str::to_string),
        CodeBlockKind::Indented => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Render message content into display blocks.
#[must_use]
pub fn render(content: &str) -> Vec<Block> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut builder = Builder::default();

    for event in Parser::new_ext(content, options) {
        if let Some((_, code)) = builder.code.as_mut() {
            match event {
                Event::Text(text) => code.push_str(&text),
                Event::End(TagEnd::CodeBlock) => builder.finish_code(),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                builder.flush_paragraph();
                builder.code = Some((language_of(&kind), String::new()));
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                builder.link = Some((dest_url.to_string(), String::new()));
            }
            Event::End(TagEnd::Link) => {
                if let Some((href, text)) = builder.link.take() {
                    builder.inlines.push(Inline::Link { href, text });
                }
            }
            Event::Start(Tag::TableCell) if !builder.inlines.is_empty() => {
                builder.push_text(" | ");
            }
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => builder.flush_paragraph(),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                builder.push_text(&text);
            }
            Event::Code(code) => builder.push_code_span(&code),
            Event::SoftBreak => builder.push_text(" "),
            Event::HardBreak => builder.push_text("\n"),
            _ => {}
        }
    }

    // Unterminated constructs at end of input.
    builder.finish_code();
    builder.flush_paragraph();
    builder.blocks
}
