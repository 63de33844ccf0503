use tokio_util::sync::CancellationToken;

use super::MessageId;

/// "Assistant is typing" flag plus the handle of its pending timeout.
///
/// Two triggers race to clear it (server activity and the timeout). Only the
/// first one has any effect.
#[derive(Debug, Default)]
pub struct TypingIndicator {
    visible: bool,
    /// Reply the current timer belongs to.
    owner: Option<MessageId>,
    cancel: Option<CancellationToken>,
}

impl TypingIndicator {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn owner(&self) -> Option<MessageId> {
        self.owner
    }

    /// Shows the indicator for `reply` and returns the token guarding its
    /// new timer.
    pub fn show(&mut self, reply: MessageId) -> CancellationToken {
        if let Some(stale) = self.cancel.take() {
            stale.cancel();
        }
        let token = CancellationToken::new();
        self.visible = true;
        self.owner = Some(reply);
        self.cancel = Some(token.clone());
        token
    }

    /// Hides the indicator. Returns the timer handle on the first call only.
    pub fn clear(&mut self) -> Option<CancellationToken> {
        if !self.visible {
            return None;
        }
        self.visible = false;
        self.cancel.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_is_idempotent() {
        let mut typing = TypingIndicator::default();
        let token = typing.show(MessageId(1));
        assert!(typing.is_visible());

        let handle = typing.clear().unwrap();
        assert!(!handle.is_cancelled());
        assert!(!typing.is_visible());

        assert!(typing.clear().is_none());
        assert!(!typing.is_visible());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_show_cancels_stale_timer() {
        let mut typing = TypingIndicator::default();
        let first = typing.show(MessageId(1));
        let second = typing.show(MessageId(2));
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(typing.owner(), Some(MessageId(2)));
    }
}
