//! Scraping collaborator: turns a URL into page text before a session exists.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::site::{SiteContext, normalize_page_text};
use crate::transport::USER_AGENT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeErrorKind {
    HttpStatus,
    Network,
    InvalidResponse,
    EmptyContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeError {
    pub kind: ScrapeErrorKind,
    pub message: String,
}

impl ScrapeError {
    fn new(kind: ScrapeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ScrapeError {}

pub trait Scraper: Send + Sync {
    fn scrape<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<SiteContext, ScrapeError>>;
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeResponse {
    #[serde(default)]
    text_content: Option<String>,
}

/// Calls an HTTP scraping endpoint answering `{ "textContent": ... }`.
#[derive(Debug, Clone)]
pub struct HttpScraper {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpScraper {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// # Errors
    /// Returns an error if the scrape endpoint is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.scrape_endpoint()?, config.connect_timeout())
    }

    async fn fetch(&self, url: &str) -> Result<SiteContext, ScrapeError> {
        tracing::info!(%url, endpoint = %self.endpoint, "scraping site");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ScrapeRequest { url })
            .send()
            .await
            .map_err(|e| {
                ScrapeError::new(
                    ScrapeErrorKind::Network,
                    format!("Scrape request failed: {e}"),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::new(
                ScrapeErrorKind::HttpStatus,
                format!("Scrape endpoint returned HTTP {}", status.as_u16()),
            ));
        }

        let body: ScrapeResponse = response.json().await.map_err(|e| {
            ScrapeError::new(
                ScrapeErrorKind::InvalidResponse,
                format!("Invalid scrape response: {e}"),
            )
        })?;

        let content = normalize_page_text(body.text_content.as_deref().unwrap_or_default());
        if content.is_empty() {
            return Err(ScrapeError::new(
                ScrapeErrorKind::EmptyContent,
                format!("No readable text found at {url}"),
            ));
        }

        tracing::info!(%url, chars = content.chars().count(), "site scraped");
        Ok(SiteContext::new(url, content))
    }
}

impl Scraper for HttpScraper {
    fn scrape<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<SiteContext, ScrapeError>> {
        Box::pin(self.fetch(url))
    }
}
