//! Title resolution: fetch a URL and pull out its `<title>`
//!
//! Resolution never fails outward. Anything that goes wrong (bad scheme,
//! transport error, timeout, non-2xx, non-HTML body, missing title) degrades
//! to [`ResolvedTitle::Unavailable`], which renders as "No title".

use crate::error::Error;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Outcome of resolving a URL's title
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTitle {
    /// Non-empty, whitespace-normalized title text
    Found(String),
    Unavailable,
}

impl ResolvedTitle {
    pub const FALLBACK: &'static str = "No title";

    /// Normalize raw title text; blank text becomes `Unavailable`.
    pub fn from_text(raw: &str) -> Self {
        let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            ResolvedTitle::Unavailable
        } else {
            ResolvedTitle::Found(title)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResolvedTitle::Found(title) => title,
            ResolvedTitle::Unavailable => Self::FALLBACK,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolvedTitle::Found(_))
    }
}

impl std::fmt::Display for ResolvedTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can turn a URL into a title.
///
/// Implementations must be total: a failure is reported as
/// [`ResolvedTitle::Unavailable`], never as an error or a panic.
#[allow(async_fn_in_trait)]
pub trait TitleResolver {
    async fn resolve(&self, url: &str) -> ResolvedTitle;
}

impl<T: TitleResolver + ?Sized> TitleResolver for &T {
    async fn resolve(&self, url: &str) -> ResolvedTitle {
        (**self).resolve(url).await
    }
}

/// HTTP resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on the whole request, connect to last byte
    pub timeout: Duration,
    /// Pause after every resolution that went to the network
    pub delay: Duration,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            delay: Duration::from_secs(5),
            user_agent: "SimpleJanitorBot".to_string(),
        }
    }
}

/// Resolves titles with a plain GET request
pub struct HttpTitleResolver {
    client: reqwest::Client,
    delay: Duration,
}

impl HttpTitleResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            delay: config.delay,
        })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, Error> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponse(format!("HTTP {}", status)));
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_hypertext(content_type) {
                return Err(Error::UnexpectedResponse(format!(
                    "not hypertext: {}",
                    content_type
                )));
            }
        }

        Ok(response.text().await?)
    }
}

impl TitleResolver for HttpTitleResolver {
    async fn resolve(&self, url: &str) -> ResolvedTitle {
        if !is_web_url(url) {
            debug!(url, "not an http(s) url, skipping fetch");
            return ResolvedTitle::Unavailable;
        }

        let resolved = match self.fetch_html(url).await {
            Ok(html) => {
                let title = extract_title(&html);
                if !title.is_found() {
                    warn!(url, "page has no usable <title>");
                }
                title
            }
            Err(e) => {
                warn!(url, error = %e, "title resolution failed");
                ResolvedTitle::Unavailable
            }
        };

        debug!(url, title = %resolved, "resolved");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        resolved
    }
}

/// Resolver that never touches the network
pub struct OfflineResolver;

impl TitleResolver for OfflineResolver {
    async fn resolve(&self, _url: &str) -> ResolvedTitle {
        ResolvedTitle::Unavailable
    }
}

/// Text of the first `<title>` element in an HTML document
pub fn extract_title(html: &str) -> ResolvedTitle {
    let doc = Html::parse_document(html);
    let Ok(selector) = Selector::parse("title") else {
        return ResolvedTitle::Unavailable;
    };

    doc.select(&selector)
        .next()
        .map(|el| ResolvedTitle::from_text(&el.text().collect::<String>()))
        .unwrap_or(ResolvedTitle::Unavailable)
}

/// http or https with a host
pub fn is_web_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn is_hypertext(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
