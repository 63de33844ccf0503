//! Incremental decoder for the chat endpoint's response body.
//!
//! Turns a byte stream into ordered text deltas. Deltas are never merged,
//! reordered, or dropped: concatenating every yielded delta reproduces the
//! assistant reply exactly.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::transport::TransportError;

/// How the chat endpoint frames its streamed reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFormat {
    /// Every body chunk is raw reply text.
    #[default]
    Text,
    /// Newline-framed `<type>:<json>` parts; `0:` carries text, `3:` an error.
    DataStream,
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamFormat::Text => write!(f, "text"),
            StreamFormat::DataStream => write!(f, "data-stream"),
        }
    }
}

/// Lazy, finite, non-restartable sequence of deltas over a response body.
///
/// The first error is terminal: it is yielded once and the stream is fused
/// afterwards.
pub struct StreamDecoder<S> {
    inner: S,
    format: StreamFormat,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, TransportError>>,
    done: bool,
}

impl<S> StreamDecoder<S> {
    pub fn new(inner: S, format: StreamFormat) -> Self {
        Self {
            inner,
            format,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        match self.format {
            StreamFormat::Text => self.drain_text(),
            StreamFormat::DataStream => self.drain_frames(),
        }
    }

    /// Emits the longest valid UTF-8 prefix and carries an incomplete tail.
    fn drain_text(&mut self) {
        let (valid, invalid) = match std::str::from_utf8(&self.buffer) {
            Ok(_) => (self.buffer.len(), false),
            Err(e) => (e.valid_up_to(), e.error_len().is_some()),
        };

        if valid > 0 {
            let bytes: Vec<u8> = self.buffer.drain(..valid).collect();
            self.push_text(bytes);
        }

        if invalid {
            self.buffer.clear();
            self.pending.push_back(Err(TransportError::decode(
                "Response body is not valid UTF-8",
            )));
        }
    }

    fn drain_frames(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if !self.handle_frame(&line) {
                self.buffer.clear();
                return;
            }
        }
    }

    /// Returns false once the frame produced a terminal error.
    fn handle_frame(&mut self, raw: &[u8]) -> bool {
        let Ok(line) = std::str::from_utf8(raw) else {
            self.pending.push_back(Err(TransportError::decode(
                "Data stream frame is not valid UTF-8",
            )));
            return false;
        };
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return true;
        }

        let Some((part_type, payload)) = line.split_once(':') else {
            self.pending.push_back(Err(TransportError::decode(format!(
                "Malformed data stream frame: {line}"
            ))
            .with_details(line.to_string())));
            return false;
        };

        match part_type {
            "0" => match serde_json::from_str::<String>(payload) {
                Ok(text) => {
                    if !text.is_empty() {
                        self.pending.push_back(Ok(text));
                    }
                    true
                }
                Err(err) => {
                    self.pending.push_back(Err(TransportError::decode(format!(
                        "Failed to parse text part: {err}"
                    ))));
                    false
                }
            },
            "3" => {
                let message = serde_json::from_str::<String>(payload)
                    .unwrap_or_else(|_| payload.to_string());
                self.pending.push_back(Err(TransportError::api(message)));
                false
            }
            other => {
                tracing::trace!(part_type = other, "ignoring data stream part");
                true
            }
        }
    }

    fn push_text(&mut self, bytes: Vec<u8>) {
        match String::from_utf8(bytes) {
            Ok(text) => self.pending.push_back(Ok(text)),
            Err(err) => self
                .pending
                .push_back(Err(TransportError::decode(err.to_string()))),
        }
    }

    fn finish(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        match self.format {
            StreamFormat::Text => {
                self.buffer.clear();
                self.pending.push_back(Err(TransportError::decode(
                    "Response ended inside a UTF-8 sequence",
                )));
            }
            StreamFormat::DataStream => {
                let tail = std::mem::take(&mut self.buffer);
                self.handle_frame(&tail);
            }
        }
    }
}

impl<S, E> Stream for StreamDecoder<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.pending.clear();
                    self.buffer.clear();
                    self.done = true;
                }
                return Poll::Ready(Some(item));
            }

            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.feed(&chunk),
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(TransportError::network(format!(
                        "Stream read error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.finish();
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
