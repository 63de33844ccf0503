//! Headless ask: scrape a site, send one question, stream the answer.

use std::io::{Write, stdout};

use anyhow::{Context, Result};
use sitechat_core::config::{self, Config};
use sitechat_core::identity::{ConfigIdentity, Identity};
use sitechat_core::scrape::{HttpScraper, Scraper};
use sitechat_core::session::{
    SessionController, SessionEffect, SessionEvent, SessionStatus, SubmitOutcome,
};
use sitechat_core::site::{SCRAPE_FAILED_MESSAGE, seed_messages, validate_site_url};
use sitechat_core::transport::{ChatTransport, HttpChatTransport, run_request};
use tracing::warn;

pub async fn run(config: &Config, url: &str, prompt: &str) -> Result<()> {
    let identity = ConfigIdentity::new(&config.user, config.sign_up_url.clone());
    let scraper = HttpScraper::from_config(config)?;
    let transport = HttpChatTransport::from_config(config)?;

    let mut out = stdout().lock();
    ask(
        &AskContext {
            config,
            identity: &identity,
            scraper: &scraper,
            transport: &transport,
        },
        url,
        prompt,
        &mut out,
    )
    .await
}

pub struct AskContext<'a> {
    pub config: &'a Config,
    pub identity: &'a dyn Identity,
    pub scraper: &'a dyn Scraper,
    pub transport: &'a dyn ChatTransport,
}

fn sign_up_error() -> anyhow::Error {
    anyhow::anyhow!(
        "Please sign up to chat: set `name` under [user] in {}",
        config::paths::config_path().display()
    )
}

/// Streams the reply to `out` as deltas arrive. On a transport error the
/// partial reply stays written and the error is returned.
pub async fn ask<W: Write>(
    ctx: &AskContext<'_>,
    url: &str,
    prompt: &str,
    out: &mut W,
) -> Result<()> {
    if ctx.identity.current_user().is_none() {
        ctx.identity.prompt_sign_up();
        return Err(sign_up_error());
    }

    let url = validate_site_url(url).map_err(anyhow::Error::msg)?;
    let site = match ctx.scraper.scrape(url.as_str()).await {
        Ok(site) => site,
        Err(err) => {
            warn!(%url, "scrape failed: {err}");
            return Err(anyhow::Error::new(err).context(SCRAPE_FAILED_MESSAGE));
        }
    };

    let seed = seed_messages(&site, ctx.config.max_site_chars);
    let mut controller = SessionController::new(site, seed, ctx.config.typing_timeout());
    let (outcome, effects) = controller.submit(prompt, ctx.identity);
    match outcome {
        SubmitOutcome::Submitted => {}
        SubmitOutcome::SignUpRequired => return Err(sign_up_error()),
        SubmitOutcome::Rejected(reason) => anyhow::bail!("Prompt rejected ({reason:?})"),
    }
    let messages = effects
        .into_iter()
        .find_map(|effect| match effect {
            SessionEffect::OpenStream { messages } => Some(messages),
            _ => None,
        })
        .context("no chat request was opened")?;

    let mut write_error = None;
    run_request(ctx.transport, messages, |event| {
        if let SessionEvent::Delta(text) = &event
            && let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush())
        {
            write_error = Some(e);
            return false;
        }
        controller.handle_event(event);
        true
    })
    .await;

    if let Some(e) = write_error {
        return Err(e).context("write response");
    }
    writeln!(out).context("write response")?;

    if controller.status() == SessionStatus::Errored {
        let err = controller
            .last_error()
            .map_or_else(|| "unknown error".to_string(), ToString::to_string);
        anyhow::bail!("Chat request failed: {err}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::future::BoxFuture;
    use futures_util::{StreamExt, stream};
    use sitechat_core::identity::{AnonymousIdentity, StaticIdentity};
    use sitechat_core::scrape::{ScrapeError, ScrapeErrorKind};
    use sitechat_core::session::{ChatMessage, Role};
    use sitechat_core::site::SiteContext;
    use sitechat_core::transport::{DeltaStream, TransportError};

    use super::*;

    struct FixedScraper(Result<String, ScrapeErrorKind>);

    impl Scraper for FixedScraper {
        fn scrape<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<SiteContext, ScrapeError>> {
            let result = match &self.0 {
                Ok(text) => Ok(SiteContext::new(url, text.clone())),
                Err(kind) => Err(ScrapeError {
                    kind: *kind,
                    message: "boom".into(),
                }),
            };
            Box::pin(async move { result })
        }
    }

    struct ScriptedTransport {
        script: Vec<Result<String, TransportError>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String, TransportError>>) -> Self {
            Self {
                script,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatTransport for ScriptedTransport {
        fn open(
            &self,
            messages: Vec<ChatMessage>,
        ) -> BoxFuture<'_, Result<DeltaStream, TransportError>> {
            self.requests.lock().unwrap().push(messages);
            let deltas = stream::iter(self.script.clone()).boxed();
            Box::pin(async move { Ok(deltas) })
        }
    }

    async fn run_ask(
        identity: &dyn Identity,
        scraper: &dyn Scraper,
        transport: &dyn ChatTransport,
    ) -> (Result<()>, String) {
        let config = Config::default();
        let ctx = AskContext {
            config: &config,
            identity,
            scraper,
            transport,
        };
        let mut out = Vec::new();
        let result = ask(&ctx, "example.com", "What is it?", &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_ask_streams_reply_with_seeded_history() {
        let scraper = FixedScraper(Ok("Example Domain".into()));
        let transport = ScriptedTransport::new(vec![Ok("It is ".into()), Ok("a demo.".into())]);
        let (result, out) =
            run_ask(&StaticIdentity::named("ada"), &scraper, &transport).await;

        result.unwrap();
        assert_eq!(out, "It is a demo.\n");
        let requests = transport.requests.lock().unwrap();
        let [messages] = requests.as_slice() else {
            panic!("expected one request");
        };
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Example Domain"));
        assert_eq!(messages.last().unwrap().content, "What is it?");
    }

    #[tokio::test]
    async fn test_ask_keeps_partial_output_on_failure() {
        let scraper = FixedScraper(Ok("page".into()));
        let transport = ScriptedTransport::new(vec![
            Ok("partial".into()),
            Err(TransportError::network("connection reset")),
        ]);
        let (result, out) =
            run_ask(&StaticIdentity::named("ada"), &scraper, &transport).await;

        assert_eq!(out, "partial\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_ask_requires_user() {
        let scraper = FixedScraper(Ok("page".into()));
        let transport = ScriptedTransport::new(Vec::new());
        let (result, out) = run_ask(&AnonymousIdentity, &scraper, &transport).await;

        assert!(result.unwrap_err().to_string().contains("sign up"));
        assert!(out.is_empty());
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ask_reports_scrape_failure() {
        let scraper = FixedScraper(Err(ScrapeErrorKind::HttpStatus));
        let transport = ScriptedTransport::new(Vec::new());
        let (result, _) = run_ask(&StaticIdentity::named("ada"), &scraper, &transport).await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), SCRAPE_FAILED_MESSAGE);
        assert!(transport.requests.lock().unwrap().is_empty());
    }
}
