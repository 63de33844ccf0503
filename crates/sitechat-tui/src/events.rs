//! UI event types.
//!
//! Everything the reducer reacts to arrives as a `UiEvent`: terminal input,
//! frame/tick timing from the runtime, and results of async work delivered
//! through the runtime inbox.

use crossterm::event::Event;
use sitechat_core::scrape::ScrapeError;
use sitechat_core::session::SessionEvent;
use sitechat_core::site::SiteContext;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Animation/render cadence.
    Tick,

    /// Current terminal size, sent before any other event of a loop turn.
    Frame { width: u16, height: u16 },

    Terminal(Event),

    /// Scrape a URL and open a chat about it (`--url` on startup).
    OpenSite { url: String },

    ScrapeFinished {
        url: String,
        result: Result<SiteContext, ScrapeError>,
    },

    /// Transport or timer event for the chat with the given generation.
    ///
    /// Each opened chat gets a new generation so events from an abandoned
    /// session are dropped.
    Session {
        generation: u64,
        event: SessionEvent,
    },
}
