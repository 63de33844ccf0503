//! Code panels: highlighted, line-numbered, copyable fenced code.

use std::io::Write;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use unicode_width::UnicodeWidthStr;

use crate::markdown::{WrapOptions, wrap_styled_spans};
use crate::style::{Style, StyledLine, StyledSpan};

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const THEME_NAME: &str = "base16-ocean.dark";
const DEFAULT_LABEL: &str = "code";
const COPY_LABEL: &str = "[Copy]";
const COPIED_LABEL: &str = "[Copied!]";
const MIN_GUTTER_DIGITS: usize = 2;

/// Language names that are not syntax tokens, mapped to file extensions.
fn extension_for(language: &str) -> Option<&'static str> {
    let ext = match language.to_ascii_lowercase().as_str() {
        "javascript" => "js",
        "python" => "py",
        "java" => "java",
        "c" => "c",
        "cpp" | "c++" => "cpp",
        "c#" => "cs",
        "ruby" => "rb",
        "php" => "php",
        "swift" => "swift",
        "objective-c" => "m",
        "kotlin" => "kt",
        "typescript" => "ts",
        "go" => "go",
        "perl" => "pl",
        "rust" => "rs",
        "scala" => "scala",
        "haskell" => "hs",
        "lua" => "lua",
        "shell" => "sh",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" => "yaml",
        "markdown" => "md",
        _ => return None,
    };
    Some(ext)
}

fn find_syntax(language: &str) -> Option<&'static SyntaxReference> {
    SYNTAX_SET.find_syntax_by_token(language).or_else(|| {
        extension_for(language).and_then(|ext| SYNTAX_SET.find_syntax_by_extension(ext))
    })
}

fn highlight(syntax: &SyntaxReference, text: &str) -> Option<Vec<Vec<StyledSpan>>> {
    let theme = THEME_SET.themes.get(THEME_NAME)?;
    let mut highlighter = HighlightLines::new(syntax, theme);
    text.split('\n')
        .map(|line| {
            let with_newline = format!("{line}\n");
            let ranges = highlighter.highlight_line(&with_newline, &SYNTAX_SET).ok()?;
            Some(
                ranges
                    .into_iter()
                    .filter_map(|(style, piece)| {
                        let piece = piece.trim_end_matches('\n');
                        let fg = style.foreground;
                        (!piece.is_empty()).then(|| {
                            StyledSpan::new(
                                piece,
                                Style::Syntax {
                                    r: fg.r,
                                    g: fg.g,
                                    b: fg.b,
                                },
                            )
                        })
                    })
                    .collect(),
            )
        })
        .collect()
}

fn plain_lines(text: &str) -> Vec<Vec<StyledSpan>> {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                Vec::new()
            } else {
                vec![StyledSpan::new(line, Style::CodeBlock)]
            }
        })
        .collect()
}

fn button_text(label: &str) -> String {
    format!(" {label:<width$} ", width = COPIED_LABEL.len())
}

/// A fenced code block prepared for display.
#[derive(Debug, Clone)]
pub struct CodePanel {
    label: String,
    text: String,
    lines: Vec<Vec<StyledSpan>>,
    highlighted: bool,
}

impl CodePanel {
    /// Prepares `text` for display, highlighting it when `language` has a grammar.
    pub fn build(language: Option<&str>, text: &str) -> Self {
        let language = language.map(str::trim).filter(|l| !l.is_empty());
        let highlighted = language
            .and_then(find_syntax)
            .and_then(|syntax| highlight(syntax, text));

        Self {
            label: language.unwrap_or(DEFAULT_LABEL).to_string(),
            text: text.to_string(),
            highlighted: highlighted.is_some(),
            lines: highlighted.unwrap_or_else(|| plain_lines(text)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The exact text the copy action puts on the clipboard.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Header line followed by numbered body lines.
    pub fn render(&self, width: usize) -> Vec<StyledLine> {
        let digits = self.line_count().to_string().len().max(MIN_GUTTER_DIGITS);
        let rest_prefix = vec![
            StyledSpan::new(" ".repeat(digits + 1), Style::CodeLineNumber),
            StyledSpan::new("│ ", Style::CodeLineNumber),
        ];

        let mut out = vec![header_line(&self.label, width, true)];
        for (i, spans) in self.lines.iter().enumerate() {
            let first_prefix = vec![
                StyledSpan::new(format!("{:>digits$} ", i + 1), Style::CodeLineNumber),
                StyledSpan::new("│ ", Style::CodeLineNumber),
            ];
            let opts = WrapOptions::new(width).with_prefixes(first_prefix, rest_prefix.clone());
            out.extend(wrap_styled_spans(spans, &opts));
        }
        out
    }
}

/// Renders code whose closing fence has not arrived: no highlighting, no
/// line numbers and no copy button.
pub fn render_pending(language: Option<&str>, text: &str, width: usize) -> Vec<StyledLine> {
    let label = language
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LABEL);
    let prefix = vec![StyledSpan::new("   │ ", Style::CodeLineNumber)];

    let mut out = vec![header_line(label, width, false)];
    for spans in plain_lines(text) {
        let opts = WrapOptions::new(width).with_prefixes(prefix.clone(), prefix.clone());
        out.extend(wrap_styled_spans(&spans, &opts));
    }
    out
}

fn header_line(label: &str, width: usize, with_button: bool) -> StyledLine {
    let left = format!(" {label} ");
    let button = if with_button {
        button_text(COPY_LABEL)
    } else {
        String::new()
    };
    let fill = width.saturating_sub(left.width() + button.width());

    let mut spans = vec![
        StyledSpan::new(left, Style::CodeHeader),
        StyledSpan::new(" ".repeat(fill), Style::CodeHeader),
    ];
    if with_button {
        spans.push(StyledSpan::new(button, Style::CodeCopy));
    }
    StyledLine { spans }
}

/// Applies selection and copied state to a rendered header line.
pub fn decorate_header(line: &mut StyledLine, selected: bool, copied: bool) {
    for span in &mut line.spans {
        match span.style {
            Style::CodeHeader if selected => span.style = Style::CodeHeaderSelected,
            Style::CodeCopy if copied => {
                span.text = button_text(COPIED_LABEL);
                span.style = Style::CodeCopied;
            }
            _ => {}
        }
    }
}

/// Copy action state of one code panel.
#[derive(Debug, Clone, Copy)]
pub struct CopyButton {
    feedback: Duration,
    copied_until: Option<Instant>,
}

impl CopyButton {
    pub fn new(feedback: Duration) -> Self {
        Self {
            feedback,
            copied_until: None,
        }
    }

    /// Writes exactly `text` to the clipboard and shows "copied".
    ///
    /// The indicator flips even when the write fails. Copying again inside
    /// the window restarts it.
    pub fn copy(&mut self, text: &str, clipboard: &dyn Clipboard, now: Instant) {
        match clipboard.copy(text) {
            Ok(()) => tracing::debug!(chars = text.chars().count(), "code copied"),
            Err(err) => tracing::warn!(error = %err, "clipboard write failed"),
        }
        self.copied_until = Some(now + self.feedback);
    }

    pub fn is_copied(&self, now: Instant) -> bool {
        self.copied_until.is_some_and(|until| now < until)
    }

    /// Resets the indicator once its window has passed. Returns true if it changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.copied_until {
            Some(until) if now >= until => {
                self.copied_until = None;
                true
            }
            _ => false,
        }
    }
}

pub trait Clipboard: Send + Sync {
    /// # Errors
    /// Returns an error if no clipboard transport accepted the text.
    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard through `arboard`, falling back to OSC 52.
///
/// The OSC 52 write only fails when stdout does; whether the terminal
/// honours the sequence cannot be observed, so the fallback is best-effort.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        copy_first_ok(&[&ArboardClipboard, &Osc52Clipboard], text)
    }
}

struct ArboardClipboard;

impl Clipboard for ArboardClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::System(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| ClipboardError::System(e.to_string()))
    }
}

/// Terminal clipboard; works over SSH when the terminal supports it.
struct Osc52Clipboard;

impl Clipboard for Osc52Clipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        write_osc52(&mut std::io::stdout(), text)
    }
}

fn write_osc52(out: &mut impl Write, text: &str) -> Result<(), ClipboardError> {
    use base64::Engine;

    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    write!(out, "\x1b]52;c;{encoded}\x1b\\")
        .and_then(|()| out.flush())
        .map_err(|e| ClipboardError::Osc52(e.to_string()))
}

/// Tries each clipboard in order; returns the last error if all fail.
fn copy_first_ok(clipboards: &[&dyn Clipboard], text: &str) -> Result<(), ClipboardError> {
    let mut last_err = ClipboardError::System("no clipboard available".to_string());
    for clipboard in clipboards {
        match clipboard.copy(text) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::debug!("clipboard attempt failed: {e}");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    Osc52(String),
    System(String),
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::Osc52(msg) => write!(f, "OSC 52 clipboard failed: {msg}"),
            ClipboardError::System(msg) => write!(f, "System clipboard failed: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}
