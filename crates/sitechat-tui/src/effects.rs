//! UI effect types.
//!
//! Effects are commands returned by the reducer that the runtime executes.
//! The reducer never performs I/O or spawns tasks itself.

use std::time::Duration;

use sitechat_core::session::{ChatMessage, MessageId};
use tokio_util::sync::CancellationToken;

use crate::transcript::CodeKey;

#[derive(Debug)]
pub enum UiEffect {
    Quit,

    /// Scrape `url`; the result comes back as `UiEvent::ScrapeFinished`.
    Scrape { url: String },

    /// Open the chat stream; progress comes back as `UiEvent::Session`.
    OpenStream {
        generation: u64,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    },

    /// Deliver `SessionEvent::TypingTimeout(reply)` after `after` unless cancelled.
    ScheduleTypingTimeout {
        generation: u64,
        reply: MessageId,
        after: Duration,
        cancel: CancellationToken,
    },

    /// Cancel a timer or stream task.
    CancelTask { token: CancellationToken },

    PromptSignUp,

    /// Write a code block to the clipboard and flip its copy indicator.
    CopyCode { key: CodeKey, text: String },
}
