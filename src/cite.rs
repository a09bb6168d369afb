//! Citation template synthesis
//!
//! Builds `{{cite web}}` / `{{cite news}}` strings from a URL, its resolved
//! title and an access date. The template kind comes from a substring match
//! against a list of known news domains; the first list entry that matches
//! wins.

use crate::title::ResolvedTitle;
use chrono::NaiveDate;
use std::fmt::Write as _;
use url::Url;

/// Built-in news domains, in match priority order
pub const NEWS_DOMAINS: &[&str] = &[
    "nytimes.com",
    "washingtonpost.com",
    "wsj.com",
    "latimes.com",
    "usatoday.com",
    "theguardian.com",
    "independent.co.uk",
    "telegraph.co.uk",
    "bbc.co.uk",
    "bbc.com",
    "reuters.com",
    "apnews.com",
    "aljazeera.com",
    "cnn.com",
    "nbcnews.com",
    "cbsnews.com",
    "abcnews.go.com",
    "foxnews.com",
    "npr.org",
    "bloomberg.com",
    "politico.com",
    "newsweek.com",
    "economist.com",
    "theatlantic.com",
    "lemonde.fr",
    "spiegel.de",
];

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which citation template to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Web,
    News,
}

impl CitationKind {
    pub fn template_name(&self) -> &'static str {
        match self {
            CitationKind::Web => "cite web",
            CitationKind::News => "cite news",
        }
    }
}

impl std::fmt::Display for CitationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.template_name())
    }
}

/// A rendered-on-display citation template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub kind: CitationKind,
    pub url: String,
    pub title: String,
    /// Publication domain, news citations only
    pub work: Option<String>,
    pub access_date: String,
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{{{} |url={} |title={}", self.kind, self.url, self.title)?;
        if let Some(work) = &self.work {
            write!(f, " |work={}", work)?;
        }
        write!(f, " |access-date={}}}}}", self.access_date)
    }
}

/// Turns resolved URLs into citation templates
#[derive(Debug, Clone)]
pub struct CitationSynthesizer {
    news_domains: Vec<String>,
    date_format: String,
    escape_titles: bool,
}

impl Default for CitationSynthesizer {
    fn default() -> Self {
        Self::new(&[], DEFAULT_DATE_FORMAT, false)
    }
}

impl CitationSynthesizer {
    /// `extra_news_domains` are matched after the built-in list.
    pub fn new(extra_news_domains: &[String], date_format: &str, escape_titles: bool) -> Self {
        let news_domains = NEWS_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .chain(extra_news_domains.iter().map(|d| d.to_lowercase()))
            .collect();

        Self {
            news_domains,
            date_format: date_format.to_string(),
            escape_titles,
        }
    }

    /// The first news domain contained in the URL, if any
    pub fn matched_news_domain(&self, url: &str) -> Option<&str> {
        let lower = url.to_lowercase();
        self.news_domains
            .iter()
            .find(|d| lower.contains(d.as_str()))
            .map(String::as_str)
    }

    pub fn kind_for(&self, url: &str) -> CitationKind {
        if self.matched_news_domain(url).is_some() {
            CitationKind::News
        } else {
            CitationKind::Web
        }
    }

    pub fn synthesize(&self, url: &str, title: &ResolvedTitle, access_date: NaiveDate) -> Citation {
        let kind = self.kind_for(url);
        let work = match kind {
            CitationKind::News => host_of(url),
            CitationKind::Web => None,
        };
        let title = if self.escape_titles {
            escape_title(title.as_str())
        } else {
            title.as_str().to_string()
        };

        Citation {
            kind,
            url: url.to_string(),
            title,
            work,
            access_date: self.format_date(access_date),
        }
    }

    /// Falls back to ISO dates when the configured format is invalid.
    fn format_date(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.date_format)).is_err() {
            return date.format(DEFAULT_DATE_FORMAT).to_string();
        }
        out
    }
}

/// Host without a leading `www.`
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// Neutralize characters that would break out of a template field
fn escape_title(title: &str) -> String {
    title
        .replace('{', "&#123;")
        .replace('}', "&#125;")
        .replace('|', "{{!}}")
}
