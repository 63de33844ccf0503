//! Single writer of the chat session.
//!
//! Reducer style: every call mutates the session in place and returns the
//! side effects a runtime must perform (open the stream, arm or cancel the
//! typing timer, ask for sign-up). Nothing here awaits.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChatMessage, Message, MessageId, Role, Session, SessionStatus, TypingIndicator};
use crate::identity::Identity;
use crate::site::SiteContext;
use crate::transport::TransportError;

/// Inputs produced by the transport task and the typing timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Response headers arrived.
    ResponseStarted,
    Delta(String),
    Finished,
    Failed(TransportError),
    /// The typing timer armed for this reply expired.
    TypingTimeout(MessageId),
}

/// Work the runtime performs on behalf of the controller.
#[derive(Debug, Clone)]
pub enum SessionEffect {
    OpenStream { messages: Vec<ChatMessage> },
    ScheduleTypingTimeout {
        reply: MessageId,
        after: Duration,
        cancel: CancellationToken,
    },
    CancelTypingTimeout { cancel: CancellationToken },
    PromptSignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    Empty,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    Rejected(SubmitRejection),
    SignUpRequired,
}

#[derive(Debug)]
pub struct SessionController {
    session: Session,
    typing: TypingIndicator,
    typing_timeout: Duration,
    next_id: u64,
    revision: u64,
    last_error: Option<TransportError>,
}

impl SessionController {
    /// Creates an idle session whose history starts with `seed`.
    pub fn new(site: SiteContext, seed: Vec<ChatMessage>, typing_timeout: Duration) -> Self {
        let messages: Vec<Message> = seed
            .into_iter()
            .zip(1..)
            .map(|(msg, id)| Message::completed(MessageId(id), msg.role, msg.content))
            .collect();
        let next_id = messages.len() as u64 + 1;

        Self {
            session: Session {
                site,
                messages,
                status: SessionStatus::Idle,
                active_assistant: None,
            },
            typing: TypingIndicator::default(),
            typing_timeout,
            next_id,
            revision: 0,
            last_error: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> Session {
        self.session.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn is_busy(&self) -> bool {
        self.session.status.is_busy()
    }

    pub fn typing_visible(&self) -> bool {
        self.typing.is_visible()
    }

    /// Bumped on every observable change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    /// Completed messages in order, as sent to the chat endpoint.
    ///
    /// Replies that failed before producing any text are left out.
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.session
            .messages
            .iter()
            .filter(|m| m.is_complete())
            .filter(|m| !(m.role == Role::Assistant && m.content().is_empty()))
            .map(|m| ChatMessage::new(m.role, m.content()))
            .collect()
    }

    pub fn submit(
        &mut self,
        text: &str,
        identity: &dyn Identity,
    ) -> (SubmitOutcome, Vec<SessionEffect>) {
        if identity.current_user().is_none() {
            debug!("submit without a user, asking for sign-up");
            return (SubmitOutcome::SignUpRequired, vec![SessionEffect::PromptSignUp]);
        }
        if text.trim().is_empty() {
            return (SubmitOutcome::Rejected(SubmitRejection::Empty), Vec::new());
        }
        if self.is_busy() {
            debug!(status = ?self.session.status, "submit while busy ignored");
            return (SubmitOutcome::Rejected(SubmitRejection::Busy), Vec::new());
        }

        let user_id = self.alloc_id();
        self.session
            .messages
            .push(Message::completed(user_id, Role::User, text));
        let messages = self.chat_history();

        let assistant_id = self.alloc_id();
        self.session
            .messages
            .push(Message::open(assistant_id, Role::Assistant));
        self.session.active_assistant = Some(assistant_id);
        self.session.status = SessionStatus::Waiting;
        self.last_error = None;
        let cancel = self.typing.show(assistant_id);
        self.bump();

        info!(message = %assistant_id, history = messages.len(), "opening chat stream");
        (
            SubmitOutcome::Submitted,
            vec![
                SessionEffect::OpenStream { messages },
                SessionEffect::ScheduleTypingTimeout {
                    reply: assistant_id,
                    after: self.typing_timeout,
                    cancel,
                },
            ],
        )
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        if let SessionEvent::TypingTimeout(reply) = event {
            if self.typing.owner() != Some(reply) {
                debug!(message = %reply, "stale typing timeout ignored");
            } else if self.typing.clear().is_some() {
                debug!(message = %reply, "typing indicator timed out");
                self.bump();
            }
            return Vec::new();
        }

        let Some(active) = self.session.active_assistant else {
            debug!(?event, "event without an active reply ignored");
            return Vec::new();
        };

        let mut effects = Vec::new();
        match event {
            SessionEvent::ResponseStarted => {
                self.clear_typing(&mut effects);
            }
            SessionEvent::Delta(delta) => {
                if self.session.status == SessionStatus::Waiting {
                    debug!(message = %active, "first delta, streaming");
                    self.session.status = SessionStatus::Streaming;
                }
                self.clear_typing(&mut effects);
                if let Some(message) = self.message_mut(active) {
                    message.append(&delta);
                }
                self.bump();
            }
            SessionEvent::Finished => {
                self.clear_typing(&mut effects);
                self.close_active(active, SessionStatus::Idle);
                info!(message = %active, "chat stream finished");
            }
            SessionEvent::Failed(err) => {
                warn!(message = %active, kind = %err.kind, "chat stream failed: {err}");
                self.clear_typing(&mut effects);
                self.close_active(active, SessionStatus::Errored);
                self.last_error = Some(err);
            }
            SessionEvent::TypingTimeout(_) => {}
        }
        effects
    }

    fn clear_typing(&mut self, effects: &mut Vec<SessionEffect>) {
        if let Some(cancel) = self.typing.clear() {
            effects.push(SessionEffect::CancelTypingTimeout { cancel });
            self.bump();
        }
    }

    fn close_active(&mut self, active: MessageId, status: SessionStatus) {
        if let Some(message) = self.message_mut(active) {
            message.complete();
        }
        self.session.active_assistant = None;
        self.session.status = status;
        self.bump();
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.session.messages.iter_mut().find(|m| m.id == id)
    }

    fn alloc_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AnonymousIdentity, StaticIdentity};
    use crate::transport::TransportErrorKind;

    fn controller() -> SessionController {
        let site = SiteContext::new("https://example.com", "Example page body");
        let seed = vec![ChatMessage::system("Answer only about example.com")];
        SessionController::new(site, seed, Duration::from_millis(30_000))
    }

    fn user() -> StaticIdentity {
        StaticIdentity::named("Ada")
    }

    fn active_content(c: &SessionController) -> String {
        c.session()
            .active_message()
            .map(|m| m.content().to_string())
            .unwrap_or_default()
    }

    fn last_assistant(c: &SessionController) -> &Message {
        c.session()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .unwrap()
    }

    #[test]
    fn test_submit_appends_pair_and_opens_stream() {
        let mut c = controller();
        let (outcome, effects) = c.submit("What is this page?", &user());

        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert_eq!(c.status(), SessionStatus::Waiting);
        assert!(c.typing_visible());

        let msgs = &c.session().messages;
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, Role::User);
        assert!(msgs[1].is_complete());
        assert_eq!(msgs[2].role, Role::Assistant);
        assert!(!msgs[2].is_complete());
        assert_eq!(c.session().active_assistant, Some(msgs[2].id));

        match &effects[..] {
            [
                SessionEffect::OpenStream { messages },
                SessionEffect::ScheduleTypingTimeout { after, .. },
            ] => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, Role::System);
                assert_eq!(messages[1], ChatMessage::user("What is this page?"));
                assert_eq!(*after, Duration::from_secs(30));
            }
            other => panic!("unexpected effects: {other:?}"),
        }
    }

    #[test]
    fn test_deltas_concatenate_in_order() {
        let mut c = controller();
        c.submit("hi", &user());
        let deltas = ["Hel", "lo", ", ", "", "wor", "ld ✓", "\n"];
        for d in deltas {
            c.handle_event(SessionEvent::Delta(d.to_string()));
            assert_eq!(c.status(), SessionStatus::Streaming);
        }
        assert_eq!(active_content(&c), deltas.concat());

        c.handle_event(SessionEvent::Finished);
        assert_eq!(c.status(), SessionStatus::Idle);
        assert!(c.session().active_assistant.is_none());
        let reply = last_assistant(&c);
        assert!(reply.is_complete());
        assert_eq!(reply.content(), deltas.concat());
    }

    #[test]
    fn test_empty_or_whitespace_submit_is_noop() {
        let mut c = controller();
        let before = c.session().messages.len();
        let revision = c.revision();

        for text in ["", "   ", "\n\t"] {
            let (outcome, effects) = c.submit(text, &user());
            assert_eq!(outcome, SubmitOutcome::Rejected(SubmitRejection::Empty));
            assert!(effects.is_empty());
        }
        assert_eq!(c.session().messages.len(), before);
        assert_eq!(c.status(), SessionStatus::Idle);
        assert_eq!(c.revision(), revision);
    }

    #[test]
    fn test_submit_while_busy_is_noop() {
        let mut c = controller();
        c.submit("first", &user());
        let (outcome, effects) = c.submit("second", &user());
        assert_eq!(outcome, SubmitOutcome::Rejected(SubmitRejection::Busy));
        assert!(effects.is_empty());

        c.handle_event(SessionEvent::Delta("x".into()));
        let (outcome, _) = c.submit("third", &user());
        assert_eq!(outcome, SubmitOutcome::Rejected(SubmitRejection::Busy));

        assert_eq!(c.session().transcript().count(), 2);
    }

    #[test]
    fn test_anonymous_submit_prompts_sign_up_without_state_change() {
        let mut c = controller();
        let (outcome, effects) = c.submit("hello", &AnonymousIdentity);
        assert_eq!(outcome, SubmitOutcome::SignUpRequired);
        assert!(matches!(effects[..], [SessionEffect::PromptSignUp]));
        assert_eq!(c.session().messages.len(), 1);
        assert_eq!(c.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_first_delta_clears_indicator_and_cancels_timer_once() {
        let mut c = controller();
        let (_, effects) = c.submit("hi", &user());
        let SessionEffect::ScheduleTypingTimeout {
            reply,
            cancel: timer,
            ..
        } = &effects[1]
        else {
            panic!("expected a typing timer");
        };
        assert_eq!(c.session().active_assistant, Some(*reply));

        let effects = c.handle_event(SessionEvent::Delta("a".into()));
        assert!(!c.typing_visible());
        match &effects[..] {
            [SessionEffect::CancelTypingTimeout { cancel }] => {
                cancel.cancel();
            }
            other => panic!("unexpected effects: {other:?}"),
        }
        assert!(timer.is_cancelled());

        assert!(c.handle_event(SessionEvent::Delta("b".into())).is_empty());
        assert!(c.handle_event(SessionEvent::TypingTimeout(*reply)).is_empty());
        assert!(!c.typing_visible());
    }

    #[test]
    fn test_response_headers_clear_indicator_before_first_delta() {
        let mut c = controller();
        c.submit("hi", &user());
        let effects = c.handle_event(SessionEvent::ResponseStarted);
        assert_eq!(effects.len(), 1);
        assert!(!c.typing_visible());
        assert_eq!(c.status(), SessionStatus::Waiting);

        assert!(c.handle_event(SessionEvent::Delta("x".into())).is_empty());
        assert_eq!(c.status(), SessionStatus::Streaming);
    }

    #[test]
    fn test_timeout_hides_indicator_but_stream_continues() {
        let mut c = controller();
        c.submit("hi", &user());
        let reply = c.session().active_assistant.unwrap();

        assert!(c.handle_event(SessionEvent::TypingTimeout(reply)).is_empty());
        assert!(!c.typing_visible());
        assert_eq!(c.status(), SessionStatus::Waiting);

        let effects = c.handle_event(SessionEvent::Delta("late".into()));
        assert!(effects.is_empty());
        assert_eq!(c.status(), SessionStatus::Streaming);
        c.handle_event(SessionEvent::Delta(" reply".into()));
        c.handle_event(SessionEvent::Finished);

        assert_eq!(last_assistant(&c).content(), "late reply");
        assert!(!c.typing_visible());
    }

    #[test]
    fn test_timeout_from_previous_reply_is_ignored() {
        let mut c = controller();
        c.submit("first", &user());
        let first = c.session().active_assistant.unwrap();
        c.handle_event(SessionEvent::Finished);

        c.submit("second", &user());
        let revision = c.revision();
        assert!(c.handle_event(SessionEvent::TypingTimeout(first)).is_empty());
        assert!(c.typing_visible());
        assert_eq!(c.revision(), revision);

        let second = c.session().active_assistant.unwrap();
        c.handle_event(SessionEvent::TypingTimeout(second));
        assert!(!c.typing_visible());
        assert_eq!(c.status(), SessionStatus::Waiting);
    }

    #[test]
    fn test_failure_keeps_partial_content_and_errors() {
        let mut c = controller();
        c.submit("hi", &user());
        c.handle_event(SessionEvent::Delta("par".into()));
        c.handle_event(SessionEvent::Delta("tial".into()));
        c.handle_event(SessionEvent::Failed(TransportError::network("reset")));

        assert_eq!(c.status(), SessionStatus::Errored);
        assert!(c.session().active_assistant.is_none());
        let reply = last_assistant(&c);
        assert!(reply.is_complete());
        assert_eq!(reply.content(), "partial");
        assert_eq!(c.last_error().unwrap().kind, TransportErrorKind::Network);

        // late events after the failure change nothing
        c.handle_event(SessionEvent::Delta("more".into()));
        assert_eq!(last_assistant(&c).content(), "partial");
    }

    #[test]
    fn test_failure_before_any_delta_leaves_empty_reply() {
        let mut c = controller();
        c.submit("hi", &user());
        let effects = c.handle_event(SessionEvent::Failed(TransportError::http_status(500, "")));
        assert!(matches!(effects[..], [SessionEffect::CancelTypingTimeout { .. }]));
        assert_eq!(last_assistant(&c).content(), "");
        assert!(last_assistant(&c).is_complete());
    }

    #[test]
    fn test_errored_session_accepts_manual_retry() {
        let mut c = controller();
        c.submit("hi", &user());
        c.handle_event(SessionEvent::Failed(TransportError::timeout("slow")));

        let (outcome, effects) = c.submit("hi again", &user());
        assert_eq!(outcome, SubmitOutcome::Submitted);
        assert!(c.last_error().is_none());

        let SessionEffect::OpenStream { messages } = &effects[0] else {
            panic!("expected OpenStream");
        };
        // seed, first user turn, retry; the empty failed reply is dropped
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, "hi again");
    }

    #[test]
    fn test_at_most_one_incomplete_message() {
        let mut c = controller();
        for round in 0..3 {
            c.submit(&format!("q{round}"), &user());
            c.handle_event(SessionEvent::Delta(format!("a{round}")));
            let open = c.session().messages.iter().filter(|m| !m.is_complete()).count();
            assert_eq!(open, 1);
            c.handle_event(SessionEvent::Finished);
            let open = c.session().messages.iter().filter(|m| !m.is_complete()).count();
            assert_eq!(open, 0);
        }
        let ids: Vec<u64> = c.session().messages.iter().map(|m| m.id.0).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_revision_tracks_every_delta() {
        let mut c = controller();
        c.submit("hi", &user());
        let mut last = c.revision();
        for _ in 0..5 {
            c.handle_event(SessionEvent::Delta("x".into()));
            assert!(c.revision() > last);
            last = c.revision();
        }
    }
}
