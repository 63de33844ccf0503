//! Pure view functions.
//!
//! Everything here takes `&AppState`, draws to a ratatui `Frame`, and never
//! mutates state or returns effects.

use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style as TermStyle};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use sitechat_core::session::SessionStatus;

use crate::code_block::decorate_header;
use crate::input::LineInput;
use crate::scroll::Scrollbar;
use crate::state::{AppState, ChatState, Screen, UrlForm};
use crate::style::{Style, convert_style, convert_styled_line};

const HEADER_HEIGHT: u16 = 1;
const INPUT_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 1;

/// Horizontal padding on each side of the transcript.
pub const TRANSCRIPT_MARGIN: u16 = 1;

/// Column reserved for the scrollbar.
const SCROLLBAR_WIDTH: u16 = 1;

const FORM_WIDTH: u16 = 72;
const FORM_HEIGHT: u16 = 9;

const CHAT_HINTS: &str = "Enter send · Tab code · Ctrl+Y copy · Ctrl+N new site · Esc quit";

/// Screen regions of the chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLayout {
    pub header: Rect,
    pub transcript: Rect,
    pub input: Rect,
    pub status: Rect,
}

impl ChatLayout {
    pub fn new(area: Rect) -> Self {
        let [header, transcript, input, status] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .areas(area);
        Self {
            header,
            transcript,
            input,
            status,
        }
    }

    /// Columns available to transcript text.
    pub fn transcript_width(&self) -> usize {
        self.transcript
            .width
            .saturating_sub(TRANSCRIPT_MARGIN * 2 + SCROLLBAR_WIDTH) as usize
    }

    pub fn transcript_height(&self) -> usize {
        self.transcript.height as usize
    }
}

pub fn render(app: &AppState, frame: &mut Frame) {
    match &app.screen {
        Screen::UrlForm(form) => render_form(form, frame),
        Screen::Chat(chat) => render_chat(chat, &ChatLayout::new(frame.area()), frame),
    }
}

fn render_form(form: &UrlForm, frame: &mut Frame) {
    let area = centered(frame.area(), FORM_WIDTH, FORM_HEIGHT);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" sitechat ")
        .border_style(TermStyle::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [prompt, input, message, _, hint] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new("Enter a website URL to chat about its content:"),
        prompt,
    );
    render_line_input(
        frame,
        input,
        &form.input,
        " URL ",
        !form.is_processing(),
    );

    let message_line = if form.is_processing() {
        Line::from(Span::styled("Processing...", convert_style(Style::Notice)))
    } else if let Some(error) = &form.error {
        Line::from(Span::styled(error.clone(), convert_style(Style::Error)))
    } else if let Some(notice) = &form.notice {
        Line::from(Span::styled(notice.clone(), convert_style(Style::Notice)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(message_line), message);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "Enter chat · Esc quit",
            TermStyle::default().fg(Color::DarkGray),
        ))),
        hint,
    );
}

fn render_chat(chat: &ChatState, layout: &ChatLayout, frame: &mut Frame) {
    let host = chat.controller.session().site.hostname();
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                " Chat about ",
                TermStyle::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                host,
                TermStyle::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
        ])),
        layout.header,
    );

    render_transcript(chat, layout, frame);

    let busy = chat.controller.is_busy();
    let title = if busy { " Waiting for reply… " } else { " Message " };
    render_line_input(frame, layout.input, &chat.input, title, !busy);
    render_status(chat, layout.status, frame);
}

fn render_transcript(chat: &ChatState, layout: &ChatLayout, frame: &mut Frame) {
    let height = layout.transcript_height();
    let lines = chat.transcript.lines();
    let offset = chat.scroll.offset().min(lines.len());
    let end = (offset + height).min(lines.len());
    let now = Instant::now();

    let mut visible: Vec<Line<'static>> = Vec::with_capacity(height);
    // Bottom-align short transcripts.
    visible.resize(height.saturating_sub(end - offset), Line::default());
    for (index, line) in lines[offset..end].iter().enumerate() {
        let mut line = line.clone();
        if let Some(code) = chat
            .transcript
            .code_blocks()
            .iter()
            .find(|code| code.line == offset + index)
        {
            let selected = chat.selected_code == Some(code.key);
            decorate_header(&mut line, selected, chat.is_copied(code.key, now));
        }
        visible.push(convert_styled_line(line));
    }

    let area = Rect {
        x: layout.transcript.x + TRANSCRIPT_MARGIN,
        y: layout.transcript.y,
        width: layout.transcript_width() as u16,
        height: layout.transcript.height,
    };
    frame.render_widget(Paragraph::new(visible), area);
    frame.render_widget(Scrollbar::from_coordinator(&chat.scroll), layout.transcript);
}

fn render_line_input(frame: &mut Frame, area: Rect, input: &LineInput, title: &str, enabled: bool) {
    let border = if enabled { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(TermStyle::default().fg(border));
    let inner = block.inner(area);

    let column = input.cursor_column();
    let visible_width = inner.width.max(1) as usize;
    let scroll = column.saturating_sub(visible_width - 1);
    let text_style = if enabled {
        TermStyle::default()
    } else {
        TermStyle::default().fg(Color::DarkGray)
    };
    let paragraph = Paragraph::new(Span::styled(input.text().to_string(), text_style))
        .block(block)
        .scroll((0, u16::try_from(scroll).unwrap_or(u16::MAX)));
    frame.render_widget(paragraph, area);

    if enabled && inner.width > 0 && inner.height > 0 {
        let x = inner.x + u16::try_from(column - scroll).unwrap_or(0);
        frame.set_cursor_position((x, inner.y));
    }
}

fn render_status(chat: &ChatState, area: Rect, frame: &mut Frame) {
    let (label, style) = match chat.controller.status() {
        SessionStatus::Idle => ("ready", TermStyle::default().fg(Color::Green)),
        SessionStatus::Waiting => ("waiting", TermStyle::default().fg(Color::Yellow)),
        SessionStatus::Streaming => ("streaming", TermStyle::default().fg(Color::Yellow)),
        SessionStatus::Errored => ("error", convert_style(Style::Error)),
    };
    let mut spans = vec![Span::styled(format!(" {label} "), style), Span::raw("  ")];
    match &chat.notice {
        Some(notice) => spans.push(Span::styled(notice.clone(), convert_style(Style::Notice))),
        None => spans.push(Span::styled(
            CHAT_HINTS,
            TermStyle::default().fg(Color::DarkGray),
        )),
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
