//! Locating reference markup in wikitext
//!
//! This is pattern matching over a restricted sublanguage, not a wikitext
//! parser. Everything the merger and upgrader need to find goes through the
//! [`Markup`] trait so the matching can be swapped out without touching them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static UNNAMED_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<ref>(.*?)</ref>").expect("valid regex"));

static URL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<ref>\s*(?P<wrapped>https?://[^\s<>\[\]{}|"]+)\s*</ref>|(?P<bare>https?://[^\s<>\[\]{}|"]+)"#,
    )
    .expect("valid regex")
});

static CITED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*url\s*=\s*(https?://[^\s|}]+)").expect("valid regex"));

/// Elements whose content renders as literal text
const LITERAL_ELEMENTS: &[&str] = &["nowiki", "pre", "source", "syntaxhighlight", "math"];

static LITERAL_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = LITERAL_ELEMENTS
        .iter()
        .map(|tag| format!(r"<{0}(?:\s[^>/]*)?>.*?</{0}\s*>", tag))
        .collect();
    Regex::new(&format!("(?is){}", alternatives.join("|"))).expect("valid regex")
});

pub const DEFAULT_CLEANUP_TEMPLATE: &str = "Cleanup bare URLs";

/// Characters stripped from the end of an unwrapped URL
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '\''];

/// An unnamed `<ref>body</ref>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpan {
    /// The whole element, tags included
    pub span: Range<usize>,
    /// The body between the tags
    pub body: Range<usize>,
}

/// A URL that is the only content of a reference, or sits bare in prose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BareUrl {
    /// Span of the URL itself; a `<ref>` wrapper lies outside it
    pub span: Range<usize>,
    pub url: String,
    pub wrapped: bool,
}

/// Finds the pieces of markup the transformations rewrite.
///
/// All spans are byte ranges into the text passed in, in document order.
pub trait Markup {
    /// Unnamed refs outside comments and literal elements
    fn unnamed_refs(&self, text: &str) -> Vec<RefSpan>;

    /// Bare URL occurrences outside templates, comments and literal elements
    fn bare_urls(&self, text: &str) -> Vec<BareUrl>;

    /// URLs already given as `|url=` in existing templates
    fn cited_urls(&self, text: &str) -> Vec<String>;

    /// First cleanup-marker template, including its line break when it
    /// stands on a line of its own.
    fn cleanup_marker(&self, text: &str) -> Option<Range<usize>>;
}

/// Regex-backed [`Markup`]
#[derive(Debug, Clone)]
pub struct PatternMarkup {
    cleanup_keys: Vec<String>,
}

impl Default for PatternMarkup {
    fn default() -> Self {
        Self::new(&[DEFAULT_CLEANUP_TEMPLATE.to_string()])
    }
}

impl PatternMarkup {
    pub fn new(cleanup_templates: &[String]) -> Self {
        Self {
            cleanup_keys: cleanup_templates.iter().map(|n| template_key(n)).collect(),
        }
    }
}

impl Markup for PatternMarkup {
    fn unnamed_refs(&self, text: &str) -> Vec<RefSpan> {
        let literal = literal_spans(text);

        UNNAMED_REF
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let body = caps.get(1)?;
                if is_protected(&literal, whole.start()) {
                    return None;
                }
                Some(RefSpan {
                    span: whole.range(),
                    body: body.range(),
                })
            })
            .collect()
    }

    fn bare_urls(&self, text: &str) -> Vec<BareUrl> {
        let protected = protected_spans(text);
        let mut found = Vec::new();

        for caps in URL_TOKEN.captures_iter(text) {
            if let Some(url) = caps.name("wrapped") {
                if is_protected(&protected, url.start()) {
                    continue;
                }
                found.push(BareUrl {
                    span: url.range(),
                    url: url.as_str().to_string(),
                    wrapped: true,
                });
            } else if let Some(url) = caps.name("bare") {
                if is_protected(&protected, url.start()) || !at_boundary(text, url.start()) {
                    continue;
                }
                let trimmed = url.as_str().trim_end_matches(TRAILING_PUNCTUATION);
                if trimmed.ends_with("//") {
                    continue;
                }
                found.push(BareUrl {
                    span: url.start()..url.start() + trimmed.len(),
                    url: trimmed.to_string(),
                    wrapped: false,
                });
            }
        }

        found
    }

    fn cited_urls(&self, text: &str) -> Vec<String> {
        CITED_URL
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    fn cleanup_marker(&self, text: &str) -> Option<Range<usize>> {
        let span = template_spans(text).into_iter().find(|span| {
            template_name(&text[span.clone()])
                .map(|name| self.cleanup_keys.contains(&template_key(name)))
                .unwrap_or(false)
        })?;

        let line_start = span.start == 0 || text[..span.start].ends_with('\n');
        let end = if line_start && text[span.end..].starts_with('\n') {
            span.end + 1
        } else {
            span.end
        };
        Some(span.start..end)
    }
}

/// Every `{{…}}` span, nested ones included, ordered by start.
/// An unterminated template runs to the end of the text.
pub fn template_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                open.push(i);
                i += 2;
            }
            (b'}', b'}') if !open.is_empty() => {
                if let Some(start) = open.pop() {
                    spans.push(start..i + 2);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }

    spans.extend(open.into_iter().map(|start| start..text.len()));
    spans.sort_by_key(|s| s.start);
    spans
}

/// `<!-- … -->` spans; an unterminated comment runs to the end
fn comment_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(offset) = text[from..].find("<!--") {
        let start = from + offset;
        let end = text[start + 4..]
            .find("-->")
            .map(|e| start + 4 + e + 3)
            .unwrap_or(text.len());
        spans.push(start..end);
        from = end;
    }

    spans
}

/// Closed `<nowiki>`, `<pre>`, `<source>`, `<syntaxhighlight>` and `<math>` elements
fn literal_element_spans(text: &str) -> Vec<Range<usize>> {
    LITERAL_ELEMENT.find_iter(text).map(|m| m.range()).collect()
}

/// Comments and literal elements: nothing inside them renders as markup
fn literal_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = comment_spans(text);
    spans.extend(literal_element_spans(text));
    spans
}

fn protected_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = template_spans(text);
    spans.extend(literal_spans(text));
    spans
}

fn is_protected(spans: &[Range<usize>], pos: usize) -> bool {
    spans.iter().any(|s| s.contains(&pos))
}

/// A bare URL must start the text or follow whitespace or a closing `>`.
fn at_boundary(text: &str, pos: usize) -> bool {
    match text[..pos].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || c == '>',
    }
}

/// Name part of `{{Name|params}}`
fn template_name(template: &str) -> Option<&str> {
    let inner = template.strip_prefix("{{")?;
    let end = inner.find(['|', '}']).unwrap_or(inner.len());
    Some(inner[..end].trim())
}

/// Canonical form of a template name: `Template:` prefix dropped,
/// underscores and whitespace runs as single spaces, first letter uppercase.
fn template_key(name: &str) -> String {
    let name = name.trim();
    let name = match name.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("template:") => &name[9..],
        _ => name,
    };

    let spaced = name.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
