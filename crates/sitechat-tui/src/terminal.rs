//! Terminal lifecycle for the chat UI.
//!
//! The chat screen lives on the alternate screen in raw mode with mouse
//! capture (wheel scrolling) and bracketed paste (pasted URLs). Every exit
//! path puts the user's shell back: drop of the runtime, error return, and
//! panic.

use std::io::{self, IsTerminal, Stdout};
use std::panic;
use std::sync::Once;

use anyhow::{Context, Result};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

static PANIC_HOOK: Once = Once::new();

/// Fails with a pointer to `sitechat ask` when not attached to a terminal.
///
/// # Errors
/// Returns an error if stdout or stderr is redirected.
pub fn require_terminal() -> Result<()> {
    if io::stdout().is_terminal() && io::stderr().is_terminal() {
        return Ok(());
    }
    anyhow::bail!(
        "The chat UI requires a terminal.\n\
         Use `sitechat ask --url <URL> --prompt '...'` for non-interactive use."
    )
}

/// Enters raw mode and the alternate screen for the chat UI.
///
/// # Errors
/// Returns an error if the terminal refuses either mode.
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to enter alternate screen");
    }
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

/// Mouse wheel scrolls the transcript; pasted text arrives as one event.
///
/// # Errors
/// Returns an error if the escape sequences cannot be written.
pub fn enable_input_features() -> Result<()> {
    execute!(io::stdout(), EnableBracketedPaste, EnableMouseCapture)
        .context("Failed to enable input features")
}

/// # Errors
/// Returns an error if the escape sequences cannot be written.
pub fn disable_input_features() -> Result<()> {
    execute!(io::stdout(), DisableMouseCapture, DisableBracketedPaste)
        .context("Failed to disable input features")
}

/// Leaves the chat screen. Safe to call more than once.
///
/// # Errors
/// Returns an error if leaving the alternate screen or raw mode fails.
pub fn restore_terminal() -> Result<()> {
    // Mouse reporting left on would flood the shell with escape codes.
    let _ = disable_input_features();
    execute!(io::stdout(), LeaveAlternateScreen).context("Failed to leave alternate screen")?;
    disable_raw_mode().context("Failed to disable raw mode")
}

/// Restores the terminal and records the panic in the log file before the
/// previous hook prints it. Installed once per process.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let _ = restore_terminal();
            tracing::error!(%info, "chat UI panicked");
            previous(info);
        }));
    });
}
