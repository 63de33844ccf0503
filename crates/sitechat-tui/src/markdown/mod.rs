//! Markdown pipeline: message text to block tree to styled lines.
//!
//! Every content change re-parses the whole message. Streamed text can
//! change block boundaries after the fact (a fence closing turns pending
//! text into a code block), so the tree is never patched in place.

mod layout;
mod parse;
mod wrap;

pub use layout::{CodeBlockRef, LayoutContext, RenderedMessage, render_nodes};
pub use parse::{CURSOR, parse_complete_markdown, parse_markdown, with_streaming_cursor};
pub use wrap::{WrapOptions, spans_width, wrap_styled_spans};

/// Block-level node of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNode {
    Paragraph(Vec<Inline>),
    Heading {
        level: u8,
        inlines: Vec<Inline>,
    },
    List {
        /// Start number for ordered lists.
        ordered: Option<u64>,
        items: Vec<Vec<RenderNode>>,
    },
    BlockQuote(Vec<RenderNode>),
    Table {
        header: Vec<Vec<Inline>>,
        rows: Vec<Vec<Vec<Inline>>>,
    },
    CodeBlock {
        language: Option<String>,
        text: String,
    },
    /// Fenced code whose closing fence has not arrived yet.
    PendingCode {
        language: Option<String>,
        text: String,
    },
    Rule,
}

/// Inline content of a leaf block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strike(Vec<Inline>),
    Code(String),
    Link { text: Vec<Inline>, url: String },
    /// The animated typing cursor.
    Cursor,
    SoftBreak,
    HardBreak,
}

impl Inline {
    /// Plain text with markup removed.
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(t) | Inline::Code(t) => out.push_str(t),
                Inline::Strong(children)
                | Inline::Emphasis(children)
                | Inline::Strike(children)
                | Inline::Link { text: children, .. } => {
                    out.push_str(&Inline::plain_text(children));
                }
                Inline::Cursor => out.push(CURSOR),
                Inline::SoftBreak => out.push(' '),
                Inline::HardBreak => out.push('\n'),
            }
        }
        out
    }
}
