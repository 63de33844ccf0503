use comfy_table::{ContentArrangement, Table, presets};
use unicode_width::UnicodeWidthStr;

use super::wrap::{WrapOptions, wrap_styled_spans};
use super::{CURSOR, Inline, RenderNode};
use crate::code_block::{CodePanel, render_pending};
use crate::style::{Style, StyledLine, StyledSpan};

const MAX_RULE_WIDTH: usize = 40;
const QUOTE_BAR: &str = "│ ";

/// Base text style for a message.
#[derive(Debug, Clone, Copy)]
pub struct LayoutContext {
    pub text_style: Style,
}

impl LayoutContext {
    pub fn new(text_style: Style) -> Self {
        Self { text_style }
    }
}

/// A copyable code block inside rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockRef {
    /// Index of the panel header within `RenderedMessage::lines`.
    pub header_line: usize,
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedMessage {
    pub lines: Vec<StyledLine>,
    pub code_blocks: Vec<CodeBlockRef>,
}

impl RenderedMessage {
    fn append(&mut self, other: RenderedMessage) {
        let offset = self.lines.len();
        self.code_blocks
            .extend(other.code_blocks.into_iter().map(|mut block| {
                block.header_line += offset;
                block
            }));
        self.lines.extend(other.lines);
    }

    /// Prefixes the first line with `first` and all others with `rest`.
    fn indent(mut self, first: &[StyledSpan], rest: &[StyledSpan]) -> Self {
        for (i, line) in self.lines.iter_mut().enumerate() {
            let prefix = if i == 0 { first } else { rest };
            let mut spans = prefix.to_vec();
            spans.append(&mut line.spans);
            line.spans = spans;
        }
        self
    }
}

/// Lays out a block tree at `width` columns.
pub fn render_nodes(nodes: &[RenderNode], width: usize, ctx: &LayoutContext) -> RenderedMessage {
    render_blocks(nodes, width.max(1), ctx, true)
}

fn render_blocks(
    nodes: &[RenderNode],
    width: usize,
    ctx: &LayoutContext,
    spaced: bool,
) -> RenderedMessage {
    let mut out = RenderedMessage::default();
    for (i, node) in nodes.iter().enumerate() {
        if spaced && i > 0 {
            out.lines.push(StyledLine::empty());
        }
        out.append(render_block(node, width, ctx));
    }
    out
}

fn render_block(node: &RenderNode, width: usize, ctx: &LayoutContext) -> RenderedMessage {
    match node {
        RenderNode::Paragraph(inlines) => text_block(inlines, ctx.text_style, width),
        RenderNode::Heading { level, inlines } => {
            let style = match level {
                1 => Style::H1,
                2 => Style::H2,
                _ => Style::H3,
            };
            text_block(inlines, style, width)
        }
        RenderNode::List { ordered, items } => render_list(*ordered, items, width, ctx),
        RenderNode::BlockQuote(children) => {
            let inner_ctx = LayoutContext::new(Style::BlockQuote);
            let bar = vec![StyledSpan::new(QUOTE_BAR, Style::BlockQuoteBar)];
            let inner_width = width.saturating_sub(QUOTE_BAR.width()).max(1);
            render_blocks(children, inner_width, &inner_ctx, true).indent(&bar, &bar)
        }
        RenderNode::Table { header, rows } => RenderedMessage {
            lines: render_table(header, rows, width, ctx.text_style),
            code_blocks: Vec::new(),
        },
        RenderNode::CodeBlock { language, text } => {
            let panel = CodePanel::build(language.as_deref(), text);
            RenderedMessage {
                lines: panel.render(width),
                code_blocks: vec![CodeBlockRef {
                    header_line: 0,
                    label: panel.label().to_string(),
                    text: panel.text().to_string(),
                }],
            }
        }
        RenderNode::PendingCode { language, text } => RenderedMessage {
            lines: render_pending(language.as_deref(), text, width),
            code_blocks: Vec::new(),
        },
        RenderNode::Rule => RenderedMessage {
            lines: vec![StyledLine::from_spans(vec![StyledSpan::new(
                "─".repeat(width.min(MAX_RULE_WIDTH)),
                Style::Rule,
            )])],
            code_blocks: Vec::new(),
        },
    }
}

fn text_block(inlines: &[Inline], style: Style, width: usize) -> RenderedMessage {
    let mut spans = Vec::new();
    inline_spans(inlines, style, &mut spans);
    RenderedMessage {
        lines: wrap_styled_spans(&spans, &WrapOptions::new(width)),
        code_blocks: Vec::new(),
    }
}

fn render_list(
    ordered: Option<u64>,
    items: &[Vec<RenderNode>],
    width: usize,
    ctx: &LayoutContext,
) -> RenderedMessage {
    let mut out = RenderedMessage::default();
    for (i, item) in items.iter().enumerate() {
        let marker = match ordered {
            Some(start) => StyledSpan::new(
                format!("{}. ", start.saturating_add(i as u64)),
                Style::ListNumber,
            ),
            None => StyledSpan::new("• ", Style::ListBullet),
        };
        let marker_width = marker.text.width();
        let rest = vec![StyledSpan::new(" ".repeat(marker_width), Style::Plain)];

        let body = render_blocks(item, width.saturating_sub(marker_width).max(1), ctx, false);
        let body = if body.lines.is_empty() {
            RenderedMessage {
                lines: vec![StyledLine::empty()],
                code_blocks: Vec::new(),
            }
        } else {
            body
        };
        out.append(body.indent(&[marker], &rest));
    }
    out
}

fn render_table(
    header: &[Vec<Inline>],
    rows: &[Vec<Vec<Inline>>],
    width: usize,
    style: Style,
) -> Vec<StyledLine> {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_width(u16::try_from(width).unwrap_or(u16::MAX));

    if !header.is_empty() {
        table.set_header(header.iter().map(|cell| Inline::plain_text(cell)));
    }
    for row in rows {
        table.add_row(row.iter().map(|cell| Inline::plain_text(cell)));
    }

    table
        .to_string()
        .lines()
        .map(|line| StyledLine::from_spans(vec![StyledSpan::new(line, style)]))
        .collect()
}

fn inline_spans(inlines: &[Inline], style: Style, out: &mut Vec<StyledSpan>) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push(StyledSpan::new(text.clone(), style)),
            Inline::Strong(children) => inline_spans(children, Style::Strong, out),
            Inline::Emphasis(children) => inline_spans(children, Style::Emphasis, out),
            Inline::Strike(children) => inline_spans(children, Style::Strike, out),
            Inline::Code(code) => out.push(StyledSpan::new(code.clone(), Style::CodeInline)),
            Inline::Link { text, url } => {
                inline_spans(text, Style::Link, out);
                if Inline::plain_text(text) != *url {
                    out.push(StyledSpan::new(format!(" ({url})"), Style::Link));
                }
            }
            Inline::Cursor => {
                out.push(StyledSpan::new(CURSOR.to_string(), Style::StreamingCursor));
            }
            Inline::SoftBreak => out.push(StyledSpan::new(" ", style)),
            Inline::HardBreak => out.push(StyledSpan::new("\n", style)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{parse_markdown, spans_width};

    fn max_line_width(lines: &[StyledLine]) -> usize {
        lines
            .iter()
            .map(|line| spans_width(&line.spans))
            .max()
            .unwrap_or(0)
    }

    fn render(text: &str, width: usize) -> RenderedMessage {
        render_nodes(
            &parse_markdown(text),
            width,
            &LayoutContext::new(Style::Assistant),
        )
    }

    fn texts(rendered: &RenderedMessage) -> Vec<String> {
        rendered.lines.iter().map(StyledLine::plain_text).collect()
    }

    #[test]
    fn test_paragraphs_are_separated_by_blank_line() {
        let rendered = render("one\n\ntwo", 20);
        assert_eq!(texts(&rendered), vec!["one", "", "two"]);
    }

    #[test]
    fn test_inline_code_and_bold_styles() {
        let rendered = render("use `cargo` **now**", 40);
        let spans = &rendered.lines[0].spans;
        assert!(spans.iter().any(|s| s.text == "cargo" && s.style == Style::CodeInline));
        assert!(spans.iter().any(|s| s.text == "now" && s.style == Style::Strong));
    }

    #[test]
    fn test_heading_styles() {
        let rendered = render("# Big\n\n## Mid\n\n#### Small", 20);
        assert_eq!(rendered.lines[0].spans[0].style, Style::H1);
        assert_eq!(rendered.lines[2].spans[0].style, Style::H2);
        assert_eq!(rendered.lines[4].spans[0].style, Style::H3);
    }

    #[test]
    fn test_lists_use_hanging_indent() {
        let rendered = render("- alpha beta gamma\n- delta\n\n7. seven", 14);
        assert_eq!(
            texts(&rendered),
            vec!["• alpha beta", "  gamma", "• delta", "", "7. seven"]
        );
    }

    #[test]
    fn test_nested_list_indents_twice() {
        let rendered = render("- a\n  - b", 20);
        assert_eq!(texts(&rendered), vec!["• a", "  • b"]);
    }

    #[test]
    fn test_blockquote_has_bar() {
        let rendered = render("> wise words", 20);
        assert_eq!(texts(&rendered), vec!["│ wise words"]);
        assert_eq!(rendered.lines[0].spans[1].style, Style::BlockQuote);
    }

    #[test]
    fn test_table_renders_cells() {
        let rendered = render("| Name | Qty |\n|---|---|\n| apple | 3 |", 40);
        let all = texts(&rendered).join("\n");
        assert!(all.contains("Name"));
        assert!(all.contains("apple"));
        assert!(rendered.lines.len() >= 5);
        assert!(max_line_width(&rendered.lines) <= 40);
    }

    #[test]
    fn test_code_block_is_registered_with_header_position() {
        let rendered = render("intro\n\n```python\nprint(1)\n```\n\n- ```sh\n  ls\n  ```", 40);
        assert_eq!(rendered.code_blocks.len(), 2);

        let first = &rendered.code_blocks[0];
        assert_eq!(first.header_line, 2);
        assert_eq!(first.label, "python");
        assert_eq!(first.text, "print(1)");
        assert!(
            rendered.lines[first.header_line]
                .plain_text()
                .contains("[Copy]")
        );

        let nested = &rendered.code_blocks[1];
        assert_eq!(nested.text, "ls");
        assert!(
            rendered.lines[nested.header_line]
                .plain_text()
                .starts_with("• ")
        );
    }

    #[test]
    fn test_pending_code_is_not_copyable() {
        let rendered = render("```python\nprint(1)", 40);
        assert!(rendered.code_blocks.is_empty());
        assert_eq!(rendered.lines[1].plain_text(), "   │ print(1)");
    }

    #[test]
    fn test_cursor_renders_as_glyph() {
        let rendered = render("Hi `▍`", 20);
        let last = rendered.lines[0].spans.last().unwrap();
        assert_eq!(last.text, "▍");
        assert_eq!(last.style, Style::StreamingCursor);
    }

    #[test]
    fn test_link_shows_target() {
        let rendered = render("[docs](https://x.dev)", 40);
        assert_eq!(texts(&rendered), vec!["docs (https://x.dev)"]);
    }

    #[test]
    fn test_rule_is_capped() {
        let rendered = render("---", 100);
        assert_eq!(rendered.lines[0].plain_text().chars().count(), MAX_RULE_WIDTH);
    }
}
