//! Semantic styles for transcript content.
//!
//! Layout code produces `StyledLine`s tagged with a semantic `Style`; the
//! renderer maps those to concrete terminal colors in `convert_style`. This
//! keeps the markdown and code panel code free of ratatui types.

use ratatui::style::{Color, Modifier, Style as TermStyle};
use ratatui::text::{Line, Span};

/// A span of text with a semantic style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: Style,
}

impl StyledSpan {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// A single display line made of styled spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    pub spans: Vec<StyledSpan>,
}

impl StyledLine {
    pub fn empty() -> Self {
        Self { spans: Vec::new() }
    }

    pub fn from_spans(spans: Vec<StyledSpan>) -> Self {
        Self { spans }
    }

    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Semantic style identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    UserPrefix,
    User,
    AssistantPrefix,
    Assistant,
    StreamingCursor,
    Typing,
    Error,
    Notice,

    // Markdown
    CodeInline,
    CodeBlock,
    Emphasis,
    Strong,
    Strike,
    H1,
    H2,
    H3,
    Link,
    BlockQuote,
    BlockQuoteBar,
    ListBullet,
    ListNumber,
    TableBorder,
    Rule,

    // Code panels
    CodeHeader,
    CodeHeaderSelected,
    CodeLineNumber,
    CodeCopy,
    CodeCopied,
    Syntax { r: u8, g: u8, b: u8 },
}

impl Style {
    /// Code styles keep their whitespace when wrapped.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            Style::CodeInline | Style::CodeBlock | Style::Syntax { .. }
        )
    }
}

/// Converts a semantic style to a ratatui style.
pub fn convert_style(style: Style) -> TermStyle {
    match style {
        Style::Plain => TermStyle::default(),
        Style::UserPrefix => TermStyle::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        Style::User => TermStyle::default().fg(Color::Green),
        Style::AssistantPrefix => TermStyle::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
        Style::Assistant => TermStyle::default().fg(Color::White),
        Style::StreamingCursor => TermStyle::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::SLOW_BLINK),
        Style::Typing => TermStyle::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        Style::Error => TermStyle::default().fg(Color::Red),
        Style::Notice => TermStyle::default().fg(Color::Yellow),

        Style::CodeInline | Style::CodeBlock => TermStyle::default().fg(Color::Cyan),
        Style::Emphasis => TermStyle::default().add_modifier(Modifier::ITALIC),
        Style::Strong => TermStyle::default().add_modifier(Modifier::BOLD),
        Style::Strike => TermStyle::default().add_modifier(Modifier::CROSSED_OUT),
        Style::H1 => TermStyle::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        Style::H2 => TermStyle::default().add_modifier(Modifier::BOLD),
        Style::H3 => TermStyle::default()
            .add_modifier(Modifier::ITALIC)
            .fg(Color::White),
        Style::Link => TermStyle::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::UNDERLINED),
        Style::BlockQuote => TermStyle::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::ITALIC),
        Style::BlockQuoteBar | Style::TableBorder | Style::Rule => {
            TermStyle::default().fg(Color::DarkGray)
        }
        Style::ListBullet | Style::ListNumber => TermStyle::default().fg(Color::Yellow),

        Style::CodeHeader => TermStyle::default()
            .fg(Color::Gray)
            .bg(Color::Rgb(45, 45, 45)),
        Style::CodeHeaderSelected => TermStyle::default()
            .fg(Color::White)
            .bg(Color::Rgb(70, 70, 90))
            .add_modifier(Modifier::BOLD),
        Style::CodeLineNumber => TermStyle::default().fg(Color::Rgb(110, 118, 129)),
        Style::CodeCopy => TermStyle::default()
            .fg(Color::Gray)
            .bg(Color::Rgb(45, 45, 45)),
        Style::CodeCopied => TermStyle::default()
            .fg(Color::Green)
            .bg(Color::Rgb(45, 45, 45))
            .add_modifier(Modifier::BOLD),
        Style::Syntax { r, g, b } => TermStyle::default().fg(Color::Rgb(r, g, b)),
    }
}

/// Converts a `StyledLine` to a ratatui `Line`.
pub fn convert_styled_line(line: StyledLine) -> Line<'static> {
    let spans: Vec<Span<'static>> = line
        .spans
        .into_iter()
        .map(|s| {
            let style = convert_style(s.style);
            Span::styled(s.text, style)
        })
        .collect();
    Line::from(spans)
}
