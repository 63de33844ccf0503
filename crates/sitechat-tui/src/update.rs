//! TUI reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use sitechat_core::identity::Identity;
use sitechat_core::scrape::ScrapeError;
use sitechat_core::session::{SessionEffect, SessionEvent, SubmitOutcome};
use sitechat_core::site::{SCRAPE_FAILED_MESSAGE, SiteContext, validate_site_url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::input::LineInput;
use crate::state::{AppState, ChatState, Screen};

/// Shown when the identity gate refuses an action.
pub const SIGN_UP_NOTICE: &str = "Please sign up to chat. A sign-up page has been opened.";

const MOUSE_SCROLL_LINES: usize = 3;

/// The main reducer function.
pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    let effects = match event {
        UiEvent::Tick => {
            if let Screen::Chat(chat) = &mut app.screen {
                chat.scroll.tick();
                chat.expire_copies(std::time::Instant::now());
            }
            vec![]
        }
        UiEvent::Frame { width, height } => {
            app.width = width;
            app.height = height;
            vec![]
        }
        UiEvent::Terminal(event) => handle_terminal_event(app, event),
        UiEvent::OpenSite { url } => {
            app.back_to_form();
            if let Screen::UrlForm(form) = &mut app.screen {
                form.input = LineInput::with_text(&url);
            }
            submit_form(app)
        }
        UiEvent::ScrapeFinished { url, result } => handle_scrape_finished(app, &url, result),
        UiEvent::Session { generation, event } => handle_session_event(app, generation, event),
    };
    app.sync_layout();
    effects
}

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
        Event::Paste(text) => {
            match &mut app.screen {
                Screen::UrlForm(form) if !form.is_processing() => form.input.insert_str(&text),
                Screen::Chat(chat) if !chat.controller.is_busy() => chat.input.insert_str(&text),
                _ => {}
            }
            vec![]
        }
        Event::Mouse(mouse) => {
            if let Screen::Chat(chat) = &mut app.screen {
                match mouse.kind {
                    MouseEventKind::ScrollUp => chat.scroll.scroll_up(MOUSE_SCROLL_LINES),
                    MouseEventKind::ScrollDown => chat.scroll.scroll_down(MOUSE_SCROLL_LINES),
                    _ => {}
                }
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => return vec![UiEffect::Quit],
        KeyCode::Char('c') if ctrl => return vec![UiEffect::Quit],
        _ => {}
    }

    if matches!(app.screen, Screen::Chat(_)) {
        return handle_chat_key(app, key, ctrl);
    }
    if key.code == KeyCode::Enter {
        return submit_form(app);
    }
    if let Screen::UrlForm(form) = &mut app.screen
        && !form.is_processing()
    {
        edit_input(&mut form.input, key);
    }
    vec![]
}

fn handle_chat_key(app: &mut AppState, key: KeyEvent, ctrl: bool) -> Vec<UiEffect> {
    let Screen::Chat(chat) = &mut app.screen else {
        return vec![];
    };

    match key.code {
        KeyCode::Enter => submit_chat(chat, app.identity.as_ref()),
        KeyCode::Char('n') if ctrl => {
            let effects = chat
                .stream_cancel
                .take()
                .map(|token| UiEffect::CancelTask { token })
                .into_iter()
                .collect();
            debug!(generation = chat.generation, "leaving chat for a new site");
            app.back_to_form();
            effects
        }
        KeyCode::Char('y') if ctrl => match chat.code_to_copy() {
            Some((key, text)) => vec![UiEffect::CopyCode { key, text }],
            None => vec![],
        },
        KeyCode::Tab | KeyCode::BackTab => {
            if let Some(line) = chat.select_code(key.code == KeyCode::Tab) {
                chat.scroll.reveal(line);
            }
            vec![]
        }
        KeyCode::PageUp => {
            chat.scroll.page_up();
            vec![]
        }
        KeyCode::PageDown => {
            chat.scroll.page_down();
            vec![]
        }
        KeyCode::Up => {
            chat.scroll.scroll_up(1);
            vec![]
        }
        KeyCode::Down => {
            chat.scroll.scroll_down(1);
            vec![]
        }
        _ => {
            if !chat.controller.is_busy() {
                edit_input(&mut chat.input, key);
            }
            vec![]
        }
    }
}

fn edit_input(input: &mut LineInput, key: KeyEvent) {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return;
    }
    match key.code {
        KeyCode::Char(ch) => input.insert_char(ch),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        _ => {}
    }
}

/// Identity gate, then URL validation, then scraping.
fn submit_form(app: &mut AppState) -> Vec<UiEffect> {
    let Screen::UrlForm(form) = &mut app.screen else {
        return vec![];
    };
    if form.is_processing() {
        return vec![];
    }
    if app.identity.current_user().is_none() {
        form.notice = Some(SIGN_UP_NOTICE.to_string());
        return vec![UiEffect::PromptSignUp];
    }

    match validate_site_url(form.input.text()) {
        Ok(url) => {
            let url = url.to_string();
            form.error = None;
            form.notice = None;
            form.processing = Some(url.clone());
            vec![UiEffect::Scrape { url }]
        }
        Err(message) => {
            form.error = Some(message.to_string());
            vec![]
        }
    }
}

fn handle_scrape_finished(
    app: &mut AppState,
    url: &str,
    result: Result<SiteContext, ScrapeError>,
) -> Vec<UiEffect> {
    let Screen::UrlForm(form) = &mut app.screen else {
        debug!(%url, "scrape result without a form ignored");
        return vec![];
    };
    if form.processing.as_deref() != Some(url) {
        debug!(%url, "stale scrape result ignored");
        return vec![];
    }

    match result {
        Ok(site) => app.open_chat(site),
        Err(err) => {
            warn!(%url, kind = ?err.kind, "scrape failed: {err}");
            form.processing = None;
            form.error = Some(SCRAPE_FAILED_MESSAGE.to_string());
        }
    }
    vec![]
}

fn submit_chat(chat: &mut ChatState, identity: &dyn Identity) -> Vec<UiEffect> {
    let text = chat.input.text().to_string();
    let (outcome, effects) = chat.controller.submit(&text, identity);
    match outcome {
        SubmitOutcome::Submitted => {
            chat.input.take();
            chat.notice = None;
        }
        SubmitOutcome::SignUpRequired => chat.notice = Some(SIGN_UP_NOTICE.to_string()),
        SubmitOutcome::Rejected(reason) => debug!(?reason, "submit rejected"),
    }
    session_effects(chat, effects)
}

fn handle_session_event(app: &mut AppState, generation: u64, event: SessionEvent) -> Vec<UiEffect> {
    let Screen::Chat(chat) = &mut app.screen else {
        return vec![];
    };
    if chat.generation != generation {
        debug!(generation, current = chat.generation, "event from an old chat ignored");
        return vec![];
    }

    let finished = matches!(event, SessionEvent::Finished | SessionEvent::Failed(_));
    let effects = chat.controller.handle_event(event);
    if finished {
        chat.stream_cancel = None;
    }
    session_effects(chat, effects)
}

/// Tags controller effects with the chat's generation.
fn session_effects(chat: &mut ChatState, effects: Vec<SessionEffect>) -> Vec<UiEffect> {
    let generation = chat.generation;
    effects
        .into_iter()
        .map(|effect| match effect {
            SessionEffect::OpenStream { messages } => {
                let cancel = CancellationToken::new();
                chat.stream_cancel = Some(cancel.clone());
                UiEffect::OpenStream {
                    generation,
                    messages,
                    cancel,
                }
            }
            SessionEffect::ScheduleTypingTimeout {
                reply,
                after,
                cancel,
            } => UiEffect::ScheduleTypingTimeout {
                generation,
                reply,
                after,
                cancel,
            },
            SessionEffect::CancelTypingTimeout { cancel } => UiEffect::CancelTask { token: cancel },
            SessionEffect::PromptSignUp => UiEffect::PromptSignUp,
        })
        .collect()
}
