//! Chat transport: opens the reply stream and feeds it to the session.

mod error;
mod http;

pub use error::{TransportError, TransportErrorKind, classify_reqwest_error};
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
pub use http::{HttpChatTransport, USER_AGENT};

use crate::session::{ChatMessage, SessionEvent};

/// Ordered text deltas of one assistant reply.
pub type DeltaStream = BoxStream<'static, Result<String, TransportError>>;

pub trait ChatTransport: Send + Sync {
    /// Sends the history and resolves once response headers arrive.
    fn open(
        &self,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<DeltaStream, TransportError>>;
}

/// Drives one request to completion, reporting progress through `emit`.
///
/// Emits `ResponseStarted`, then every delta in order, then exactly one of
/// `Finished` / `Failed`. `emit` returning false means nobody is listening
/// any more and the request is dropped.
pub async fn run_request<F>(
    transport: &dyn ChatTransport,
    messages: Vec<ChatMessage>,
    mut emit: F,
) where
    F: FnMut(SessionEvent) -> bool,
{
    let mut stream = match transport.open(messages).await {
        Ok(stream) => stream,
        Err(err) => {
            emit(SessionEvent::Failed(err));
            return;
        }
    };

    if !emit(SessionEvent::ResponseStarted) {
        return;
    }

    let mut deltas = 0usize;
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => {
                deltas += 1;
                if !emit(SessionEvent::Delta(delta)) {
                    tracing::debug!(deltas, "receiver gone, dropping chat stream");
                    return;
                }
            }
            Err(err) => {
                emit(SessionEvent::Failed(err));
                return;
            }
        }
    }

    tracing::debug!(deltas, "chat stream ended");
    emit(SessionEvent::Finished);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::stream;

    use super::*;

    /// Replays a fixed script of deltas.
    struct ScriptedTransport {
        opened: Mutex<Vec<Vec<ChatMessage>>>,
        script: Vec<Result<String, TransportError>>,
        fail_open: Option<TransportError>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String, TransportError>>) -> Self {
            Self {
                opened: Mutex::new(Vec::new()),
                script,
                fail_open: None,
            }
        }
    }

    impl ChatTransport for ScriptedTransport {
        fn open(
            &self,
            messages: Vec<ChatMessage>,
        ) -> BoxFuture<'_, Result<DeltaStream, TransportError>> {
            self.opened.lock().unwrap().push(messages);
            let result = match &self.fail_open {
                Some(err) => Err(err.clone()),
                None => Ok(stream::iter(self.script.clone()).boxed()),
            };
            Box::pin(async move { result })
        }
    }

    async fn events_for(transport: &ScriptedTransport) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        run_request(transport, vec![ChatMessage::user("hi")], |ev| {
            events.push(ev);
            true
        })
        .await;
        events
    }

    #[tokio::test]
    async fn test_run_request_emits_lifecycle_in_order() {
        let transport = ScriptedTransport::new(vec![Ok("a".into()), Ok("b".into())]);
        let events = events_for(&transport).await;
        assert_eq!(
            events,
            vec![
                SessionEvent::ResponseStarted,
                SessionEvent::Delta("a".into()),
                SessionEvent::Delta("b".into()),
                SessionEvent::Finished,
            ]
        );
        assert_eq!(transport.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_request_mid_stream_error_is_terminal() {
        let transport = ScriptedTransport::new(vec![
            Ok("a".into()),
            Err(TransportError::decode("bad")),
            Ok("never".into()),
        ]);
        let events = events_for(&transport).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[2],
            SessionEvent::Failed(ref e) if e.kind == TransportErrorKind::Decode
        ));
    }

    #[tokio::test]
    async fn test_run_request_open_failure_skips_started() {
        let mut transport = ScriptedTransport::new(Vec::new());
        transport.fail_open = Some(TransportError::http_status(401, ""));
        let events = events_for(&transport).await;
        assert_eq!(
            events,
            vec![SessionEvent::Failed(TransportError::http_status(401, ""))]
        );
    }

    #[tokio::test]
    async fn test_run_request_stops_when_receiver_gone() {
        let transport = ScriptedTransport::new(vec![Ok("a".into()), Ok("b".into())]);
        let mut seen = 0;
        run_request(&transport, Vec::new(), |_| {
            seen += 1;
            seen < 2
        })
        .await;
        assert_eq!(seen, 2);
    }
}
