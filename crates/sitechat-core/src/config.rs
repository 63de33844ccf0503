//! Configuration management for sitechat.
//!
//! Loads configuration from ${SITECHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::stream::StreamFormat;

/// Environment variable overriding the chat endpoint.
pub const CHAT_URL_ENV: &str = "SITECHAT_CHAT_URL";
/// Environment variable overriding the scraping endpoint.
pub const SCRAPE_URL_ENV: &str = "SITECHAT_SCRAPE_URL";

/// The signed-in user, as far as the local config knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chat_url: String,
    pub scrape_url: String,
    pub stream_format: StreamFormat,
    pub typing_timeout_ms: u64,
    pub copy_feedback_ms: u64,
    pub max_site_chars: usize,
    pub connect_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_up_url: Option<String>,
    pub user: UserConfig,
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for sitechat configuration and log directories.
    //!
    //! SITECHAT_HOME resolution order:
    //! 1. SITECHAT_HOME environment variable (if set)
    //! 2. ~/.config/sitechat (default)

    use std::path::PathBuf;

    pub fn sitechat_home() -> PathBuf {
        if let Ok(home) = std::env::var("SITECHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".sitechat"),
            |h| h.join(".config").join("sitechat"),
        )
    }

    pub fn config_path() -> PathBuf {
        sitechat_home().join("config.toml")
    }

    pub fn logs_dir() -> PathBuf {
        sitechat_home().join("logs")
    }
}

impl Config {
    pub const DEFAULT_CHAT_URL: &'static str = "http://localhost:3000/api/chat";
    pub const DEFAULT_SCRAPE_URL: &'static str = "http://localhost:3000/api/scrapper";
    pub const DEFAULT_TYPING_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_COPY_FEEDBACK_MS: u64 = 2_000;
    pub const DEFAULT_MAX_SITE_CHARS: usize = 24_000;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default config to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Chat endpoint with precedence env > config > default.
    ///
    /// # Errors
    /// Returns an error if the resolved value is not a valid URL.
    pub fn chat_endpoint(&self) -> Result<String> {
        resolve_endpoint(
            std::env::var(CHAT_URL_ENV).ok(),
            &self.chat_url,
            Self::DEFAULT_CHAT_URL,
            "chat",
        )
    }

    /// Scraping endpoint with precedence env > config > default.
    ///
    /// # Errors
    /// Returns an error if the resolved value is not a valid URL.
    pub fn scrape_endpoint(&self) -> Result<String> {
        resolve_endpoint(
            std::env::var(SCRAPE_URL_ENV).ok(),
            &self.scrape_url,
            Self::DEFAULT_SCRAPE_URL,
            "scrape",
        )
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    pub fn copy_feedback(&self) -> Duration {
        Duration::from_millis(self.copy_feedback_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_url: Self::DEFAULT_CHAT_URL.to_string(),
            scrape_url: Self::DEFAULT_SCRAPE_URL.to_string(),
            stream_format: StreamFormat::default(),
            typing_timeout_ms: Self::DEFAULT_TYPING_TIMEOUT_MS,
            copy_feedback_ms: Self::DEFAULT_COPY_FEEDBACK_MS,
            max_site_chars: Self::DEFAULT_MAX_SITE_CHARS,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            sign_up_url: None,
            user: UserConfig::default(),
        }
    }
}

/// Resolves an endpoint with precedence: env > config > default.
///
/// Blank values fall through to the next source.
fn resolve_endpoint(
    env_value: Option<String>,
    config_value: &str,
    default_url: &str,
    name: &str,
) -> Result<String> {
    let chosen = env_value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| Some(config_value.trim()).filter(|v| !v.is_empty()))
        .unwrap_or(default_url);

    url::Url::parse(chosen).with_context(|| format!("Invalid {name} endpoint URL: {chosen}"))?;
    Ok(chosen.to_string())
}
