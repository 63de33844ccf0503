use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::{Inline, RenderNode};

/// Typing cursor sentinel.
pub const CURSOR: char = '▍';
const ESCAPED_CURSOR: &str = "`▍`";

/// Parses in-flight message text into a block tree.
///
/// Accepts any prefix of a markdown document. A fence still open at the end
/// of the text becomes `RenderNode::PendingCode`; fences closed by their
/// container (a quote or list item ending) are complete.
pub fn parse_markdown(text: &str) -> Vec<RenderNode> {
    parse(text, true)
}

/// Parses the text of a finished message. Every fence is a `CodeBlock`.
pub fn parse_complete_markdown(text: &str) -> Vec<RenderNode> {
    parse(text, false)
}

fn parse(text: &str, streaming: bool) -> Vec<RenderNode> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_MATH);

    let mut builder = TreeBuilder::new(text, streaming);
    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        builder.handle(event, range);
    }
    builder.finish()
}

/// Appends the escaped cursor to in-flight content for display.
///
/// The cursor goes on its own line after anything that could be a partial
/// fence, so appending it never extends or closes a fence.
pub fn with_streaming_cursor(content: &str) -> String {
    let last_line = content.rsplit('\n').next().unwrap_or_default().trim();
    let separator = if content.is_empty() || content.ends_with('\n') {
        ""
    } else if last_line.starts_with(['`', '~']) || last_line.ends_with(['`', '~']) {
        "\n"
    } else if content.ends_with(char::is_whitespace) {
        ""
    } else {
        " "
    };
    format!("{content}{separator}{ESCAPED_CURSOR}")
}

enum BlockKind {
    Root,
    Quote,
    List(Option<u64>),
    Item,
}

struct Block {
    kind: BlockKind,
    children: Vec<RenderNode>,
    items: Vec<Vec<RenderNode>>,
}

impl Block {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Clone, Copy)]
enum LeafKind {
    Paragraph,
    Heading(u8),
    Cell,
}

enum Wrapper {
    Strong,
    Emphasis,
    Strike,
    Link(String),
}

struct Leaf {
    kind: LeafKind,
    /// Open inline wrappers; the first entry is the leaf itself.
    stack: Vec<(Option<Wrapper>, Vec<Inline>)>,
}

impl Leaf {
    fn new(kind: LeafKind) -> Self {
        Self {
            kind,
            stack: vec![(None, Vec::new())],
        }
    }

    fn push(&mut self, inline: Inline) {
        let Some((_, children)) = self.stack.last_mut() else {
            return;
        };
        if let Inline::Text(text) = &inline
            && let Some(Inline::Text(prev)) = children.last_mut()
        {
            prev.push_str(text);
            return;
        }
        children.push(inline);
    }

    fn close_wrapper(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        let Some((Some(wrapper), children)) = self.stack.pop() else {
            return;
        };
        let inline = match wrapper {
            Wrapper::Strong => Inline::Strong(children),
            Wrapper::Emphasis => Inline::Emphasis(children),
            Wrapper::Strike => Inline::Strike(children),
            Wrapper::Link(url) => Inline::Link {
                text: children,
                url,
            },
        };
        self.push(inline);
    }

    fn into_inlines(mut self) -> Vec<Inline> {
        while self.stack.len() > 1 {
            self.close_wrapper();
        }
        self.stack.pop().map(|(_, inlines)| inlines).unwrap_or_default()
    }
}

struct CodeState {
    language: Option<String>,
    fenced: bool,
    range: Range<usize>,
    text: String,
}

#[derive(Default)]
struct TableState {
    header: Vec<Vec<Inline>>,
    rows: Vec<Vec<Vec<Inline>>>,
    row: Vec<Vec<Inline>>,
}

struct TreeBuilder<'a> {
    source: &'a str,
    streaming: bool,
    blocks: Vec<Block>,
    leaf: Option<Leaf>,
    code: Option<CodeState>,
    table: Option<TableState>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str, streaming: bool) -> Self {
        Self {
            source,
            streaming,
            blocks: vec![Block::new(BlockKind::Root)],
            leaf: None,
            code: None,
            table: None,
        }
    }

    fn handle(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline(code_span(&code)),
            Event::SoftBreak => self.inline(Inline::SoftBreak),
            Event::HardBreak => self.inline(Inline::HardBreak),
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.inline(Inline::Text(marker.to_string()));
            }
            Event::FootnoteReference(label) => self.inline(Inline::Text(format!("[^{label}]"))),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.inline(Inline::Code(math.to_string()));
            }
            Event::Rule => {
                self.close_leaf();
                self.push_node(RenderNode::Rule);
            }
            // Raw HTML is never shown; it can carry terminal escapes.
            Event::Html(_) | Event::InlineHtml(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        match tag {
            Tag::Paragraph => self.open_leaf(LeafKind::Paragraph),
            Tag::Heading { level, .. } => self.open_leaf(LeafKind::Heading(heading_level(level))),
            Tag::BlockQuote(_) => self.open_block(BlockKind::Quote),
            Tag::List(start) => self.open_block(BlockKind::List(start)),
            Tag::Item => self.open_block(BlockKind::Item),
            Tag::CodeBlock(kind) => {
                self.close_leaf();
                let (language, fenced) = match kind {
                    CodeBlockKind::Fenced(info) => (
                        info.split_whitespace().next().map(str::to_string),
                        true,
                    ),
                    CodeBlockKind::Indented => (None, false),
                };
                self.code = Some(CodeState {
                    language,
                    fenced,
                    range,
                    text: String::new(),
                });
            }
            Tag::Table(_) => {
                self.close_leaf();
                self.table = Some(TableState::default());
            }
            Tag::TableCell => self.open_leaf(LeafKind::Cell),
            Tag::Emphasis => self.open_wrapper(Wrapper::Emphasis),
            Tag::Strong => self.open_wrapper(Wrapper::Strong),
            Tag::Strikethrough => self.open_wrapper(Wrapper::Strike),
            Tag::Link { dest_url, .. } => self.open_wrapper(Wrapper::Link(dest_url.to_string())),
            // Image alt text flows through as plain text.
            Tag::Image { .. }
            | Tag::TableHead
            | Tag::TableRow
            | Tag::HtmlBlock
            | Tag::FootnoteDefinition(_)
            | Tag::MetadataBlock(_)
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::Superscript
            | Tag::Subscript => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::TableCell => self.close_leaf(),
            TagEnd::BlockQuote(_) | TagEnd::List(_) | TagEnd::Item => self.close_block(),
            TagEnd::CodeBlock => self.finish_code(),
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
                    self.push_node(RenderNode::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                if let Some(leaf) = &mut self.leaf {
                    leaf.close_wrapper();
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code {
            code.text.push_str(text);
            return;
        }
        if text.chars().eq([CURSOR]) {
            self.inline(Inline::Cursor);
        } else {
            self.inline(Inline::Text(text.to_string()));
        }
    }

    fn inline(&mut self, inline: Inline) {
        self.leaf
            .get_or_insert_with(|| Leaf::new(LeafKind::Paragraph))
            .push(inline);
    }

    fn open_leaf(&mut self, kind: LeafKind) {
        self.close_leaf();
        self.leaf = Some(Leaf::new(kind));
    }

    fn open_wrapper(&mut self, wrapper: Wrapper) {
        self.leaf
            .get_or_insert_with(|| Leaf::new(LeafKind::Paragraph))
            .stack
            .push((Some(wrapper), Vec::new()));
    }

    fn close_leaf(&mut self) {
        let Some(leaf) = self.leaf.take() else {
            return;
        };
        let kind = leaf.kind;
        let inlines = leaf.into_inlines();
        match kind {
            LeafKind::Paragraph => {
                if !inlines.is_empty() {
                    self.push_node(RenderNode::Paragraph(inlines));
                }
            }
            LeafKind::Heading(level) => self.push_node(RenderNode::Heading { level, inlines }),
            LeafKind::Cell => {
                if let Some(table) = &mut self.table {
                    table.row.push(inlines);
                }
            }
        }
    }

    fn open_block(&mut self, kind: BlockKind) {
        self.close_leaf();
        self.blocks.push(Block::new(kind));
    }

    fn close_block(&mut self) {
        self.close_leaf();
        if self.blocks.len() < 2 {
            return;
        }
        let Some(block) = self.blocks.pop() else {
            return;
        };
        match block.kind {
            BlockKind::Quote => self.push_node(RenderNode::BlockQuote(block.children)),
            BlockKind::List(ordered) => self.push_node(RenderNode::List {
                ordered,
                items: block.items,
            }),
            BlockKind::Item => match self.blocks.last_mut() {
                Some(parent) if matches!(parent.kind, BlockKind::List(_)) => {
                    parent.items.push(block.children);
                }
                _ => {
                    for node in block.children {
                        self.push_node(node);
                    }
                }
            },
            BlockKind::Root => self.blocks.push(block),
        }
    }

    fn push_node(&mut self, node: RenderNode) {
        if let Some(block) = self.blocks.last_mut() {
            block.children.push(node);
        }
    }

    fn finish_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        let closed = !self.streaming
            || !code.fenced
            || code.range.end < self.source.len()
            || fence_is_closed(self.source.get(code.range).unwrap_or_default(), &code.text);
        let text = display_code_text(&code.text);
        let language = code.language;
        self.push_node(if closed {
            RenderNode::CodeBlock { language, text }
        } else {
            RenderNode::PendingCode { language, text }
        });
    }

    fn finish(mut self) -> Vec<RenderNode> {
        self.close_leaf();
        self.finish_code();
        while self.blocks.len() > 1 {
            self.close_block();
        }
        self.blocks
            .pop()
            .map(|root| root.children)
            .unwrap_or_default()
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn code_span(code: &str) -> Inline {
    if code.chars().eq([CURSOR]) {
        Inline::Cursor
    } else {
        Inline::Code(code.replace(ESCAPED_CURSOR, "▍"))
    }
}

/// A closed fence spans one more source line than its opening line plus content.
fn fence_is_closed(source: &str, content: &str) -> bool {
    source.lines().count() > content.lines().count() + 1
}

fn display_code_text(raw: &str) -> String {
    let text = raw.replace(ESCAPED_CURSOR, "▍");
    match text.strip_suffix('\n') {
        Some(trimmed) => trimmed.to_string(),
        None => text,
    }
}
