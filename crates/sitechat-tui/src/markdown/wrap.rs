//! Width-aware wrapping of styled spans with hanging indents.

use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::style::{Style, StyledLine, StyledSpan};

/// Prefixes and width for one wrapped block.
#[derive(Debug, Clone, Default)]
pub struct WrapOptions {
    pub width: usize,
    /// Prefix of the first line (a list marker, a quote bar, a line number).
    pub first_prefix: Vec<StyledSpan>,
    /// Prefix of continuation lines.
    pub rest_prefix: Vec<StyledSpan>,
}

impl WrapOptions {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    pub fn with_prefixes(mut self, first: Vec<StyledSpan>, rest: Vec<StyledSpan>) -> Self {
        self.first_prefix = first;
        self.rest_prefix = rest;
        self
    }
}

const TAB_WIDTH: usize = 4;

pub fn spans_width(spans: &[StyledSpan]) -> usize {
    spans.iter().map(|s| s.text.width()).sum()
}

struct LineBuilder<'a> {
    opts: &'a WrapOptions,
    lines: Vec<StyledLine>,
    spans: Vec<StyledSpan>,
    used: usize,
    first_avail: usize,
    rest_avail: usize,
}

impl<'a> LineBuilder<'a> {
    fn new(opts: &'a WrapOptions) -> Self {
        Self {
            opts,
            lines: Vec::new(),
            spans: Vec::new(),
            used: 0,
            first_avail: opts
                .width
                .saturating_sub(spans_width(&opts.first_prefix))
                .max(1),
            rest_avail: opts
                .width
                .saturating_sub(spans_width(&opts.rest_prefix))
                .max(1),
        }
    }

    fn avail(&self) -> usize {
        if self.lines.is_empty() {
            self.first_avail
        } else {
            self.rest_avail
        }
    }

    fn room(&self) -> usize {
        self.avail().saturating_sub(self.used)
    }

    fn break_line(&mut self) {
        let prefix = if self.lines.is_empty() {
            &self.opts.first_prefix
        } else {
            &self.opts.rest_prefix
        };
        let mut spans = prefix.clone();
        spans.append(&mut self.spans);
        self.lines.push(StyledLine { spans });
        self.used = 0;
    }

    fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        self.used += text.width();
        // Merge with the previous fragment when the style matches.
        if let Some(last) = self.spans.last_mut()
            && last.style == style
        {
            last.text.push_str(text);
            return;
        }
        self.spans.push(StyledSpan::new(text, style));
    }

    fn push_space(&mut self, style: Style) {
        if self.used > 0 && self.room() > 0 {
            self.push(" ", style);
        }
    }

    /// Places `text` character by character, breaking lines at the width.
    fn push_chars(&mut self, text: &str, style: Style) {
        let mut chunk = String::new();
        let mut chunk_width = 0;
        for ch in text.chars() {
            let w = ch.width().unwrap_or(0);
            let taken = self.used + chunk_width;
            if w > 0 && taken + w > self.avail() && taken > 0 {
                self.push(&std::mem::take(&mut chunk), style);
                self.break_line();
                chunk_width = 0;
            }
            chunk.push(ch);
            chunk_width += w;
        }
        self.push(&chunk, style);
    }

    fn push_code(&mut self, text: &str, style: Style) {
        let expanded = expand_tabs(text, self.used);
        let text = expanded.as_ref();
        let w = text.width();
        if w <= self.room() {
            self.push(text, style);
        } else if w <= self.rest_avail && self.used > 0 {
            self.break_line();
            self.push(text, style);
        } else {
            self.push_chars(text, style);
        }
    }

    fn push_words(&mut self, text: &str, style: Style) {
        let mut words = text.split_whitespace().peekable();
        if words.peek().is_none() {
            self.push_space(style);
            return;
        }
        if text.starts_with(char::is_whitespace) {
            self.push_space(style);
        }

        let mut first = true;
        for word in words {
            let w = word.width();
            if !first {
                if self.used > 0 && w < self.room() {
                    self.push(" ", style);
                } else if self.used > 0 {
                    self.break_line();
                }
            }
            first = false;

            if w <= self.room() {
                self.push(word, style);
            } else if w <= self.rest_avail && self.used > 0 {
                self.break_line();
                self.push(word, style);
            } else {
                if self.used > 0 {
                    self.break_line();
                }
                self.push_chars(word, style);
            }
        }

        if text.ends_with(char::is_whitespace) {
            self.push_space(style);
        }
    }

    fn finish(mut self) -> Vec<StyledLine> {
        if !self.spans.is_empty() || self.lines.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

/// Replaces tabs with spaces up to the next tab stop. Terminals measure a tab
/// as zero columns, which breaks wrapping.
fn expand_tabs(text: &str, start_column: usize) -> Cow<'_, str> {
    if !text.contains('\t') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + TAB_WIDTH);
    let mut column = start_column;
    for ch in text.chars() {
        if ch == '\t' {
            let spaces = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', spaces));
            column += spaces;
        } else {
            out.push(ch);
            column += ch.width().unwrap_or(0);
        }
    }
    Cow::Owned(out)
}

/// Wraps styled spans to `opts.width`.
///
/// Prose wraps at word boundaries with whitespace collapsed. Code styles keep
/// their whitespace and break by character width. A `\n` inside span text is
/// a hard break. Always returns at least one line.
pub fn wrap_styled_spans(spans: &[StyledSpan], opts: &WrapOptions) -> Vec<StyledLine> {
    let mut builder = LineBuilder::new(opts);
    for span in spans {
        for (i, part) in span.text.split('\n').enumerate() {
            if i > 0 {
                builder.break_line();
            }
            if span.style.is_code() {
                builder.push_code(part, span.style);
            } else {
                builder.push_words(part, span.style);
            }
        }
    }
    builder.finish()
}
