//! The page a session talks about, and the seed prompt built from it.

use url::Url;

use crate::session::ChatMessage;

/// Shown under the URL field when the input cannot be used.
pub const INVALID_URL_MESSAGE: &str = "Please enter a valid URL";
/// Shown under the URL field when scraping failed.
pub const SCRAPE_FAILED_MESSAGE: &str =
    "There was an error reading the site. Please try again with a different URL.";

const TRUNCATION_MARKER: &str = "\n\n[... page content truncated ...]";

/// Scraped page, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    url: String,
    content: String,
}

impl SiteContext {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Host part of the URL, or the raw URL if it has none.
    pub fn hostname(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Builds the grounding messages placed before any user turn.
///
/// Content longer than `max_chars` characters is cut on a char boundary and
/// marked as truncated.
pub fn seed_messages(site: &SiteContext, max_chars: usize) -> Vec<ChatMessage> {
    let content = truncate_chars(site.content(), max_chars);
    let prompt = format!(
        "You are a helpful assistant answering questions about the web page at {url}.\n\
         Answer only using the page content below. If the answer is not in the content, \
         say that the page does not cover it. Use Markdown when it helps, and put code in \
         fenced blocks with a language tag.\n\n\
         <page url=\"{url}\">\n{content}\n</page>",
        url = site.url(),
    );
    vec![ChatMessage::system(prompt)]
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Normalizes user input into an absolute http(s) URL.
///
/// # Errors
/// Returns [`INVALID_URL_MESSAGE`] when the input is empty or unusable.
pub fn validate_site_url(input: &str) -> Result<Url, &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(INVALID_URL_MESSAGE);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).ok().ok_or(INVALID_URL_MESSAGE)?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    if !matches!(url.scheme(), "http" | "https") || !has_host {
        return Err(INVALID_URL_MESSAGE);
    }
    Ok(url)
}

/// Tidies scraped text: trailing whitespace goes, blank runs collapse to one.
pub fn normalize_page_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = false;

    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if blank_run {
            out.push('\n');
            blank_run = false;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_hostname() {
        let site = SiteContext::new("https://docs.rs/tokio/latest", "");
        assert_eq!(site.hostname(), "docs.rs");
        assert_eq!(SiteContext::new("not a url", "").hostname(), "not a url");
    }

    #[test]
    fn test_seed_embeds_url_and_content() {
        let site = SiteContext::new("https://example.com", "Hello from the page");
        let seed = seed_messages(&site, 1_000);
        assert_eq!(seed.len(), 1);
        assert_eq!(seed[0].role, Role::System);
        assert!(seed[0].content.contains("https://example.com"));
        assert!(seed[0].content.contains("Hello from the page"));
        assert!(!seed[0].content.contains("truncated"));
    }

    #[test]
    fn test_seed_truncates_on_char_boundary() {
        let site = SiteContext::new("https://example.com", "ééééé");
        let seed = seed_messages(&site, 3);
        assert!(seed[0].content.contains("ééé\n\n[... page content truncated ...]"));
        assert!(!seed[0].content.contains("éééé"));
    }

    #[test]
    fn test_validate_site_url() {
        assert_eq!(validate_site_url(""), Err(INVALID_URL_MESSAGE));
        assert_eq!(validate_site_url("   "), Err(INVALID_URL_MESSAGE));
        assert_eq!(
            validate_site_url("example.com/docs").unwrap().as_str(),
            "https://example.com/docs"
        );
        assert_eq!(
            validate_site_url(" http://example.com ").unwrap().as_str(),
            "http://example.com/"
        );
        assert_eq!(validate_site_url("ftp://example.com"), Err(INVALID_URL_MESSAGE));
        assert_eq!(validate_site_url("https://"), Err(INVALID_URL_MESSAGE));
    }

    #[test]
    fn test_normalize_page_text() {
        let raw = "\n\n  Title  \n\n\n\nBody line   \nnext\n\n";
        assert_eq!(normalize_page_text(raw), "  Title\n\nBody line\nnext");
        assert_eq!(normalize_page_text(" \n\t\n"), "");
    }
}
