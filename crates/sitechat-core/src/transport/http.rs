use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;

use super::{ChatTransport, DeltaStream, TransportError, classify_reqwest_error};
use crate::config::Config;
use crate::session::ChatMessage;
use crate::stream::{StreamDecoder, StreamFormat};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("sitechat/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

/// Streams replies from an HTTP chat endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    http: reqwest::Client,
    url: String,
    format: StreamFormat,
}

impl HttpChatTransport {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        format: StreamFormat,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
            format,
        })
    }

    /// # Errors
    /// Returns an error if the chat endpoint is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.chat_endpoint()?,
            config.stream_format,
            config.connect_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(match self.format {
                StreamFormat::Text => "text/plain",
                StreamFormat::DataStream => "text/plain, application/json",
            }),
        );

        tracing::info!(
            url = %self.url,
            messages = messages.len(),
            format = %self.format,
            "POST chat"
        );
        let response = self
            .http
            .post(&self.url)
            .headers(headers)
            .json(&ChatRequest {
                messages: &messages,
            })
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat endpoint rejected request");
            return Err(TransportError::http_status(status.as_u16(), &body));
        }

        let body = response.bytes_stream();
        Ok(StreamDecoder::new(body, self.format).boxed())
    }
}

impl ChatTransport for HttpChatTransport {
    fn open(
        &self,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<DeltaStream, TransportError>> {
        Box::pin(self.send(messages))
    }
}
