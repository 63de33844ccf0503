//! Application state.
//!
//! `AppState` is owned by the runtime and only mutated by the reducer
//! (`update.rs`) and the few effects that touch local UI state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use sitechat_core::config::Config;
use sitechat_core::identity::Identity;
use sitechat_core::session::SessionController;
use sitechat_core::site::{SiteContext, seed_messages};
use tokio_util::sync::CancellationToken;

use crate::code_block::{Clipboard, CopyButton};
use crate::input::LineInput;
use crate::render::ChatLayout;
use crate::scroll::ScrollCoordinator;
use crate::transcript::{CodeKey, TranscriptView};

pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn Identity>,
    pub screen: Screen,
    pub width: u16,
    pub height: u16,
    pub should_quit: bool,
    next_generation: u64,
}

pub enum Screen {
    UrlForm(UrlForm),
    Chat(Box<ChatState>),
}

/// The "which site?" form shown before a session exists.
#[derive(Debug, Default)]
pub struct UrlForm {
    pub input: LineInput,
    /// Inline validation or scrape error.
    pub error: Option<String>,
    /// Sign-up hint after the identity gate refused.
    pub notice: Option<String>,
    /// URL being scraped.
    pub processing: Option<String>,
}

impl UrlForm {
    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }
}

pub struct ChatState {
    /// Distinguishes this chat's async events from an abandoned one's.
    pub generation: u64,
    pub controller: SessionController,
    pub input: LineInput,
    pub transcript: TranscriptView,
    pub scroll: ScrollCoordinator,
    pub selected_code: Option<CodeKey>,
    pub notice: Option<String>,
    /// Cancels the in-flight request when the chat is abandoned.
    pub stream_cancel: Option<CancellationToken>,
    copy_buttons: HashMap<CodeKey, CopyButton>,
    copy_feedback: Duration,
    seen_revision: Option<u64>,
}

impl ChatState {
    pub fn new(generation: u64, controller: SessionController, copy_feedback: Duration) -> Self {
        Self {
            generation,
            controller,
            input: LineInput::new(),
            transcript: TranscriptView::new(),
            scroll: ScrollCoordinator::new(),
            selected_code: None,
            notice: None,
            stream_cancel: None,
            copy_buttons: HashMap::new(),
            copy_feedback,
            seen_revision: None,
        }
    }

    /// Brings the transcript layout and scroll position up to date.
    ///
    /// Every new session revision re-pins the viewport to the bottom; a
    /// width change alone only re-measures.
    pub fn sync_layout(&mut self, width: usize, height: usize) {
        if !self.scroll.is_mounted() || self.scroll.viewport_height() != height {
            self.scroll.mount(height);
        }
        let rebuilt = self.transcript.refresh(&self.controller, width);

        let revision = self.controller.revision();
        if self.seen_revision != Some(revision) {
            self.seen_revision = Some(revision);
            self.scroll.on_session_update(self.transcript.height());
        } else if rebuilt {
            self.scroll.set_content_height(self.transcript.height());
        }
    }

    /// Moves the code selection one block, wrapping around, and returns the
    /// selected header line. Without a selection the newest block goes first.
    pub fn select_code(&mut self, forward: bool) -> Option<usize> {
        let blocks = self.transcript.code_blocks();
        if blocks.is_empty() {
            return None;
        }
        let last = blocks.len() - 1;
        let current = self
            .selected_code
            .and_then(|key| blocks.iter().position(|b| b.key == key));
        let next = match (current, forward) {
            (None, _) => last,
            (Some(i), true) if i == last => 0,
            (Some(i), true) => i + 1,
            (Some(0), false) => last,
            (Some(i), false) => i - 1,
        };
        self.selected_code = Some(blocks[next].key);
        Some(blocks[next].line)
    }

    /// The selected block's key and text, falling back to the newest block.
    pub fn code_to_copy(&self) -> Option<(CodeKey, String)> {
        let blocks = self.transcript.code_blocks();
        let block = match self.selected_code {
            Some(key) => blocks.iter().find(|b| b.key == key),
            None => blocks.last(),
        }?;
        Some((block.key, block.text.clone()))
    }

    pub fn copy_code(&mut self, key: CodeKey, text: &str, clipboard: &dyn Clipboard, now: Instant) {
        let feedback = self.copy_feedback;
        self.copy_buttons
            .entry(key)
            .or_insert_with(|| CopyButton::new(feedback))
            .copy(text, clipboard, now);
    }

    pub fn is_copied(&self, key: CodeKey, now: Instant) -> bool {
        self.copy_buttons
            .get(&key)
            .is_some_and(|button| button.is_copied(now))
    }

    /// Resets copy indicators whose window has passed.
    pub fn expire_copies(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for button in self.copy_buttons.values_mut() {
            changed |= button.expire(now);
        }
        changed
    }

    fn has_copy_feedback(&self, now: Instant) -> bool {
        self.copy_buttons.values().any(|b| b.is_copied(now))
    }
}

impl AppState {
    pub fn new(config: Config, identity: Arc<dyn Identity>) -> Self {
        Self {
            config,
            identity,
            screen: Screen::UrlForm(UrlForm::default()),
            width: 0,
            height: 0,
            should_quit: false,
            next_generation: 1,
        }
    }

    /// Starts a fresh session about `site`.
    pub fn open_chat(&mut self, site: SiteContext) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let seed = seed_messages(&site, self.config.max_site_chars);
        tracing::info!(generation, url = %site.url(), "opening chat");
        let controller = SessionController::new(site, seed, self.config.typing_timeout());
        self.screen = Screen::Chat(Box::new(ChatState::new(
            generation,
            controller,
            self.config.copy_feedback(),
        )));
        self.sync_layout();
    }

    /// Drops the current session and shows an empty form.
    pub fn back_to_form(&mut self) {
        self.screen = Screen::UrlForm(UrlForm::default());
    }

    pub fn chat_layout(&self) -> ChatLayout {
        ChatLayout::new(Rect::new(0, 0, self.width, self.height))
    }

    pub fn sync_layout(&mut self) {
        let layout = self.chat_layout();
        if let Screen::Chat(chat) = &mut self.screen {
            chat.sync_layout(layout.transcript_width(), layout.transcript_height());
        }
    }

    /// Whether the runtime should tick at frame rate.
    pub fn needs_fast_tick(&self) -> bool {
        match &self.screen {
            Screen::UrlForm(form) => form.is_processing(),
            Screen::Chat(chat) => {
                chat.controller.is_busy()
                    || chat.scroll.is_animating()
                    || chat.has_copy_feedback(Instant::now())
            }
        }
    }
}
