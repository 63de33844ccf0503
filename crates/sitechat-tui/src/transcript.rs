//! Transcript layout: session messages to display lines.
//!
//! Completed assistant replies are cached per width; only the in-flight
//! reply is re-parsed when the session changes.

use std::collections::HashMap;

use sitechat_core::session::{Message, MessageId, Role, SessionController, SessionStatus};

use crate::markdown::{
    LayoutContext, RenderedMessage, WrapOptions, parse_complete_markdown, parse_markdown,
    render_nodes, with_streaming_cursor, wrap_styled_spans,
};
use crate::style::{Style, StyledLine, StyledSpan};

const TYPING_TEXT: &str = "Assistant is typing…";

/// Identifies one code block of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeKey {
    pub message: MessageId,
    pub index: usize,
}

/// A copyable code block positioned in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptCode {
    pub key: CodeKey,
    /// Header line index within `TranscriptView::lines`.
    pub line: usize,
    pub label: String,
    pub text: String,
}

#[derive(Debug)]
struct CachedReply {
    width: usize,
    content_len: usize,
    rendered: RenderedMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BuildKey {
    revision: u64,
    width: usize,
}

#[derive(Debug, Default)]
pub struct TranscriptView {
    cache: HashMap<MessageId, CachedReply>,
    lines: Vec<StyledLine>,
    code_blocks: Vec<TranscriptCode>,
    built: Option<BuildKey>,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[StyledLine] {
        &self.lines
    }

    pub fn height(&self) -> usize {
        self.lines.len()
    }

    pub fn code_blocks(&self) -> &[TranscriptCode] {
        &self.code_blocks
    }

    /// Rebuilds the layout if the session or width changed since the last
    /// call. Returns true when it rebuilt.
    pub fn refresh(&mut self, controller: &SessionController, width: usize) -> bool {
        let key = BuildKey {
            revision: controller.revision(),
            width,
        };
        if self.built == Some(key) {
            return false;
        }
        self.rebuild(controller, width.max(1));
        self.built = Some(key);
        true
    }

    fn rebuild(&mut self, controller: &SessionController, width: usize) {
        self.lines.clear();
        self.code_blocks.clear();
        let session = controller.session();
        let typing = controller.typing_visible();

        for message in session.transcript() {
            let rendered = match message.role {
                Role::User => Some(render_user(message.content(), width)),
                Role::Assistant => {
                    // While the indicator is up an empty reply shows as the typing row.
                    if message.content().is_empty() && !message.is_complete() && typing {
                        None
                    } else if message.content().is_empty() && message.is_complete() {
                        None
                    } else {
                        Some(self.render_assistant(message, width))
                    }
                }
                Role::System => None,
            };
            if let Some(rendered) = rendered {
                self.push_message(message, rendered);
            }
        }

        if typing {
            self.push_separator();
            self.lines.push(StyledLine::from_spans(vec![StyledSpan::new(
                TYPING_TEXT,
                Style::Typing,
            )]));
        }

        if controller.status() == SessionStatus::Errored
            && let Some(err) = controller.last_error()
        {
            self.push_separator();
            let spans = vec![StyledSpan::new(format!("⚠ {err}"), Style::Error)];
            self.lines
                .extend(wrap_styled_spans(&spans, &WrapOptions::new(width)));
        }

        tracing::trace!(
            lines = self.lines.len(),
            code_blocks = self.code_blocks.len(),
            "transcript rebuilt"
        );
    }

    fn render_assistant(&mut self, message: &Message, width: usize) -> RenderedMessage {
        let ctx = LayoutContext::new(Style::Assistant);
        if !message.is_complete() {
            let text = with_streaming_cursor(message.content());
            return render_nodes(&parse_markdown(&text), width, &ctx);
        }

        let content_len = message.content().len();
        if let Some(cached) = self.cache.get(&message.id)
            && cached.width == width
            && cached.content_len == content_len
        {
            return cached.rendered.clone();
        }

        let rendered = render_nodes(&parse_complete_markdown(message.content()), width, &ctx);
        self.cache.insert(
            message.id,
            CachedReply {
                width,
                content_len,
                rendered: rendered.clone(),
            },
        );
        rendered
    }

    fn push_separator(&mut self) {
        if !self.lines.is_empty() {
            self.lines.push(StyledLine::empty());
        }
    }

    fn push_message(&mut self, message: &Message, rendered: RenderedMessage) {
        self.push_separator();
        let label = match message.role {
            Role::User => StyledSpan::new("You", Style::UserPrefix),
            _ => StyledSpan::new("Assistant", Style::AssistantPrefix),
        };
        self.lines.push(StyledLine::from_spans(vec![label]));

        let offset = self.lines.len();
        for (index, block) in rendered.code_blocks.into_iter().enumerate() {
            self.code_blocks.push(TranscriptCode {
                key: CodeKey {
                    message: message.id,
                    index,
                },
                line: offset + block.header_line,
                label: block.label,
                text: block.text,
            });
        }
        self.lines.extend(rendered.lines);
    }
}

fn render_user(content: &str, width: usize) -> RenderedMessage {
    let spans = vec![StyledSpan::new(content, Style::User)];
    RenderedMessage {
        lines: wrap_styled_spans(&spans, &WrapOptions::new(width)),
        code_blocks: Vec::new(),
    }
}
