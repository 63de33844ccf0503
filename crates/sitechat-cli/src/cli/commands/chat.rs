//! Interactive chat command handler.

use anyhow::{Context, Result};
use sitechat_core::config::Config;

pub async fn run(config: &Config, url: Option<String>) -> Result<()> {
    sitechat_tui::run_app(config, url)
        .await
        .context("interactive chat failed")
}
