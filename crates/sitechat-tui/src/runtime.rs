//! TUI runtime: owns the terminal, runs the event loop, executes effects.
//!
//! All side effects happen here; the reducer stays pure and returns
//! effects. Async work reports back through the inbox channel, which the
//! loop drains every turn.

use std::future::Future;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use sitechat_core::scrape::Scraper;
use sitechat_core::session::{ChatMessage, SessionEvent};
use sitechat_core::transport::{ChatTransport, run_request};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::code_block::Clipboard;
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::{AppState, Screen};
use crate::{render, terminal, update};

/// Frame interval while something is moving (~60fps).
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll interval when idle.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

pub type UiEventSender = mpsc::UnboundedSender<UiEvent>;
type UiEventReceiver = mpsc::UnboundedReceiver<UiEvent>;

/// External collaborators the runtime talks to.
pub struct Services {
    pub transport: Arc<dyn ChatTransport>,
    pub scraper: Arc<dyn Scraper>,
    pub clipboard: Box<dyn Clipboard>,
}

/// Full-screen runtime. The terminal is restored on drop and on panic.
pub struct TuiRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: AppState,
    services: Services,
    inbox_tx: UiEventSender,
    inbox_rx: UiEventReceiver,
    last_tick: Instant,
    last_terminal_event: Instant,
}

impl TuiRuntime {
    /// # Errors
    /// Returns an error if the terminal cannot be set up.
    pub fn new(state: AppState, services: Services) -> Result<Self> {
        // Panic hook goes in before the alternate screen.
        terminal::install_panic_hook();
        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let now = Instant::now();
        Ok(Self {
            terminal,
            state,
            services,
            inbox_tx,
            inbox_rx,
            last_tick: now,
            last_terminal_event: now,
        })
    }

    /// Queues an event for the next loop turn.
    pub fn send(&self, event: UiEvent) {
        let _ = self.inbox_tx.send(event);
    }

    /// Runs the event loop until the user quits.
    ///
    /// # Errors
    /// Returns an error if terminal I/O fails.
    pub fn run(&mut self) -> Result<()> {
        terminal::enable_input_features()?;
        let result = self.event_loop();
        let _ = terminal::disable_input_features();
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            let mut events = self.collect_events()?;

            // Layout updates run before anything else this turn.
            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                if matches!(&event, UiEvent::Terminal(_)) {
                    self.last_terminal_event = Instant::now();
                }
                // Only Tick renders, which caps the frame rate at the tick cadence.
                if matches!(&event, UiEvent::Tick) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty {
                self.terminal.draw(|frame| render::render(&self.state, frame))?;
                dirty = false;
            }
        }

        Ok(())
    }

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let recent_input = self.last_terminal_event.elapsed() < IDLE_POLL_DURATION;
        let tick_interval = if self.state.needs_fast_tick() || recent_input {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        while let Ok(ev) = self.inbox_rx.try_recv() {
            events.push(ev);
        }

        // Block until the next tick only when there is nothing to process.
        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };
        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    /// Spawns an async effect whose result comes back through the inbox.
    fn spawn_effect<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(f().await);
        });
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::Scrape { url } => {
                let scraper = Arc::clone(&self.services.scraper);
                self.spawn_effect(move || async move {
                    let result = scraper.scrape(&url).await;
                    UiEvent::ScrapeFinished { url, result }
                });
            }
            UiEffect::OpenStream {
                generation,
                messages,
                cancel,
            } => {
                spawn_stream(
                    Arc::clone(&self.services.transport),
                    self.inbox_tx.clone(),
                    generation,
                    messages,
                    cancel,
                );
            }
            UiEffect::ScheduleTypingTimeout {
                generation,
                reply,
                after,
                cancel,
            } => {
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    if typing_timer(after, cancel).await {
                        let _ = tx.send(UiEvent::Session {
                            generation,
                            event: SessionEvent::TypingTimeout(reply),
                        });
                    }
                });
            }
            UiEffect::CancelTask { token } => token.cancel(),
            UiEffect::PromptSignUp => self.state.identity.prompt_sign_up(),
            UiEffect::CopyCode { key, text } => {
                if let Screen::Chat(chat) = &mut self.state.screen {
                    chat.copy_code(key, &text, self.services.clipboard.as_ref(), Instant::now());
                }
            }
        }
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}

/// Runs one chat request, forwarding its events until done or cancelled.
fn spawn_stream(
    transport: Arc<dyn ChatTransport>,
    tx: UiEventSender,
    generation: u64,
    messages: Vec<ChatMessage>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let emit = |event| tx.send(UiEvent::Session { generation, event }).is_ok();
        tokio::select! {
            () = cancel.cancelled() => debug!(generation, "chat stream cancelled"),
            () = run_request(transport.as_ref(), messages, emit) => {}
        }
    });
}

/// Waits `after`, returning false if cancelled first.
pub(crate) async fn typing_timer(after: Duration, cancel: CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(after) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::StreamExt;
    use futures_util::future::BoxFuture;
    use futures_util::stream;
    use sitechat_core::transport::{DeltaStream, TransportError};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_typing_timer_fires_after_timeout() {
        let cancel = CancellationToken::new();
        let timer = tokio::spawn(typing_timer(Duration::from_secs(30), cancel));
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!timer.is_finished());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(timer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_timer_cancelled_by_first_delta() {
        let cancel = CancellationToken::new();
        let timer = tokio::spawn(typing_timer(Duration::from_secs(30), cancel.clone()));
        tokio::time::advance(Duration::from_secs(5)).await;
        cancel.cancel();
        assert!(!timer.await.unwrap());
    }

    /// Yields deltas, then hangs until dropped.
    struct HangingTransport {
        opened: Mutex<usize>,
    }

    impl ChatTransport for HangingTransport {
        fn open(
            &self,
            _messages: Vec<ChatMessage>,
        ) -> BoxFuture<'_, Result<DeltaStream, TransportError>> {
            *self.opened.lock().unwrap() += 1;
            let deltas = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())])
                .chain(stream::pending());
            Box::pin(async move { Ok(deltas.boxed()) })
        }
    }

    #[tokio::test]
    async fn test_stream_events_are_tagged_and_stop_on_cancel() {
        let transport = Arc::new(HangingTransport {
            opened: Mutex::new(0),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        spawn_stream(transport.clone(), tx, 7, Vec::new(), cancel.clone());

        let mut deltas = Vec::new();
        while deltas.len() < 2 {
            match rx.recv().await {
                Some(UiEvent::Session {
                    generation: 7,
                    event: SessionEvent::Delta(text),
                }) => deltas.push(text),
                Some(UiEvent::Session {
                    generation: 7,
                    event: SessionEvent::ResponseStarted,
                }) => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(deltas, vec!["a", "b"]);

        cancel.cancel();
        // The task drops its sender once cancelled, closing the channel.
        assert!(rx.recv().await.is_none());
        assert_eq!(*transport.opened.lock().unwrap(), 1);
    }
}
