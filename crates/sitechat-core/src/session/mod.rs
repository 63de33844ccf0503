//! Chat session model and the controller that owns it.

mod controller;
mod typing;

use std::fmt;

pub use controller::{
    SessionController, SessionEffect, SessionEvent, SubmitOutcome, SubmitRejection,
};
use serde::{Deserialize, Serialize};
pub use typing::TypingIndicator;

use crate::site::SiteContext;

/// Identifier of a message, unique and increasing within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One transcript entry.
///
/// `content` only grows while `complete` is false and is frozen afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    content: String,
    complete: bool,
}

impl Message {
    pub(crate) fn completed(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            complete: true,
        }
    }

    pub(crate) fn open(id: MessageId, role: Role) -> Self {
        Self {
            id,
            role,
            content: String::new(),
            complete: false,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Appends a delta; returns false if the message is already complete.
    pub(crate) fn append(&mut self, delta: &str) -> bool {
        if self.complete {
            return false;
        }
        self.content.push_str(delta);
        true
    }

    pub(crate) fn complete(&mut self) {
        self.complete = true;
    }
}

/// Wire shape of a message sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Request sent, no delta yet.
    Waiting,
    Streaming,
    /// Last request failed; a new submit is allowed.
    Errored,
}

impl SessionStatus {
    pub fn is_busy(self) -> bool {
        matches!(self, SessionStatus::Waiting | SessionStatus::Streaming)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub site: SiteContext,
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    /// Set exactly while `status` is waiting or streaming.
    pub active_assistant: Option<MessageId>,
}

impl Session {
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// User and assistant messages, in order. Seed messages are hidden.
    pub fn transcript(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
    }

    pub fn active_message(&self) -> Option<&Message> {
        self.active_assistant.and_then(|id| self.message(id))
    }
}
