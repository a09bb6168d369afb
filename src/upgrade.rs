//! Bare URL upgrading
//!
//! Replaces the first occurrence of each bare URL with a citation template.
//! Repeats of a URL already handled in the same pass, or already cited by a
//! template elsewhere in the document, are left alone so each distinct URL
//! costs at most one title resolution.

use crate::cite::CitationSynthesizer;
use crate::markup::{BareUrl, Markup, PatternMarkup};
use crate::merge::splice;
use crate::title::TitleResolver;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;

/// URLs already handled during one scan
#[derive(Debug, Default)]
pub struct SeenUrls {
    urls: HashSet<String>,
}

impl SeenUrls {
    /// Record the URL; true if it had not been seen before.
    pub fn first_sight(&mut self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl Extend<String> for SeenUrls {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.urls.extend(iter);
    }
}

/// Result of an upgrade pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub text: String,
    /// True iff at least one URL was replaced; marker removal alone does not count
    pub changed: bool,
    /// URLs replaced, in document order
    pub upgraded: Vec<String>,
    pub marker_removed: bool,
}

pub struct BareUrlUpgrader<R, M = PatternMarkup> {
    resolver: R,
    markup: M,
    synthesizer: CitationSynthesizer,
    access_date: NaiveDate,
}

impl<R: TitleResolver> BareUrlUpgrader<R> {
    pub fn new(resolver: R, access_date: NaiveDate) -> Self {
        Self {
            resolver,
            markup: PatternMarkup::default(),
            synthesizer: CitationSynthesizer::default(),
            access_date,
        }
    }
}

impl<R: TitleResolver, M: Markup> BareUrlUpgrader<R, M> {
    pub fn with_markup<N: Markup>(self, markup: N) -> BareUrlUpgrader<R, N> {
        BareUrlUpgrader {
            resolver: self.resolver,
            markup,
            synthesizer: self.synthesizer,
            access_date: self.access_date,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: CitationSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn markup(&self) -> &M {
        &self.markup
    }

    pub fn access_date(&self) -> NaiveDate {
        self.access_date
    }

    pub async fn upgrade_bare_urls(&self, text: &str) -> UpgradeOutcome {
        let (text, marker_removed) = match self.markup.cleanup_marker(text) {
            Some(span) => (splice(text, &[(span, String::new())]), true),
            None => (text.to_string(), false),
        };

        let mut seen = SeenUrls::default();
        seen.extend(self.markup.cited_urls(&text));

        let pending = self.first_sightings(&text, &mut seen);

        let mut edits = Vec::with_capacity(pending.len());
        let mut upgraded = Vec::with_capacity(pending.len());

        for occurrence in pending {
            let title = self.resolver.resolve(&occurrence.url).await;
            let citation = self
                .synthesizer
                .synthesize(&occurrence.url, &title, self.access_date);
            debug!(url = %occurrence.url, wrapped = occurrence.wrapped, "upgrading bare url");

            edits.push((occurrence.span, citation.to_string()));
            upgraded.push(occurrence.url);
        }

        let changed = !edits.is_empty();
        let text = if changed { splice(&text, &edits) } else { text };

        UpgradeOutcome {
            text,
            changed,
            upgraded,
            marker_removed,
        }
    }

    /// Bare URL occurrences not yet in `seen`, marking each as seen.
    /// Later repeats of a URL within `text` are dropped.
    pub fn first_sightings(&self, text: &str, seen: &mut SeenUrls) -> Vec<BareUrl> {
        self.markup
            .bare_urls(text)
            .into_iter()
            .filter(|occurrence| seen.first_sight(&occurrence.url))
            .collect()
    }
}
