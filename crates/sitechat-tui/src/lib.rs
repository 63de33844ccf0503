//! Full-screen terminal UI for sitechat.
//!
//! Elm-style: `state` + `events` feed the `update` reducer, which returns
//! `effects` that `runtime` executes; `render` draws from state only.

pub mod code_block;
pub mod effects;
pub mod events;
pub mod input;
pub mod markdown;
pub mod render;
pub mod runtime;
pub mod scroll;
pub mod state;
pub mod style;
pub mod terminal;
pub mod transcript;
pub mod update;

use std::io::{Write, stderr};
use std::sync::Arc;

use anyhow::Result;
pub use runtime::{Services, TuiRuntime};
use sitechat_core::config::Config;
use sitechat_core::identity::ConfigIdentity;
use sitechat_core::scrape::HttpScraper;
use sitechat_core::transport::HttpChatTransport;

use crate::code_block::SystemClipboard;
use crate::events::UiEvent;
use crate::state::AppState;

/// Runs the interactive app, starting on the URL form or, with
/// `initial_url`, scraping that site right away.
///
/// # Errors
/// Returns an error if stdout or stderr is not a terminal, an endpoint is invalid, or
/// terminal I/O fails.
pub async fn run_app(config: &Config, initial_url: Option<String>) -> Result<()> {
    terminal::require_terminal()?;

    let services = Services {
        transport: Arc::new(HttpChatTransport::from_config(config)?),
        scraper: Arc::new(HttpScraper::from_config(config)?),
        clipboard: Box::new(SystemClipboard),
    };
    let identity = Arc::new(ConfigIdentity::new(
        &config.user,
        config.sign_up_url.clone(),
    ));
    let state = AppState::new(config.clone(), identity);

    let mut runtime = TuiRuntime::new(state, services)?;
    if let Some(url) = initial_url {
        runtime.send(UiEvent::OpenSite { url });
    }
    runtime.run()?;
    drop(runtime);

    writeln!(stderr(), "Goodbye!")?;
    Ok(())
}
