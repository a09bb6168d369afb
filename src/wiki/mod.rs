//! Collaborators the bot runner talks to: page storage, worklists, audit log
//!
//! The transformation engine never sees these; only [`crate::bot`] does.

pub mod local;
pub mod mediawiki;

use crate::error::{Error, SaveError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

pub use local::LocalWiki;
pub use mediawiki::MediaWikiClient;

pub type RevisionId = u64;

/// Header written at the top of a fresh log page
pub const LOG_HEADER: &str = "== Log ==\n";

static NOBOTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\{\{\s*nobots\s*\}\}").expect("valid regex"));

static BOTS_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\{\s*bots\s*\|\s*(allow|deny)\s*=\s*([^}]*)\}\}").expect("valid regex")
});

/// Which pages to work on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    /// Members of a category, with or without the `Category:` prefix
    Category(String),
    /// A fixed list of pages
    Pages(Vec<String>),
}

#[allow(async_fn_in_trait)]
pub trait PageStore {
    /// Current text, or `None` when the page does not exist
    async fn get_text(&self, page: &str) -> Result<Option<String>, Error>;

    async fn put_text(&self, page: &str, text: &str, comment: &str) -> Result<RevisionId, SaveError>;
}

#[allow(async_fn_in_trait)]
pub trait Worklist {
    /// Order carries no meaning
    async fn list_candidate_pages(&self, criterion: &Criterion) -> Result<Vec<String>, Error>;
}

#[allow(async_fn_in_trait)]
pub trait AuditLog {
    async fn append_log(&self, page: &str, comment: &str, revision: RevisionId) -> Result<(), Error>;
}

/// One log line: `* 2024-01-01 12:00 UTC – [[Page]] – comment – [[Special:Diff/42|diff]]`
pub fn log_entry(page: &str, comment: &str, revision: RevisionId, at: DateTime<Utc>) -> String {
    format!(
        "* {} – [[{}]] – {} – [[Special:Diff/{}|diff]]\n",
        at.format("%Y-%m-%d %H:%M UTC"),
        page,
        comment,
        revision
    )
}

/// Bot-exclusion check (`{{nobots}}`, `{{bots|allow=…}}`, `{{bots|deny=…}}`).
///
/// Returns the reason the bot may not edit, if any. `username` may be a
/// bot-password login (`Name@app`); only the account part is compared.
pub fn bot_exclusion(text: &str, username: Option<&str>) -> Option<String> {
    if let Some(m) = NOBOTS.find(text) {
        return Some(m.as_str().to_string());
    }

    let account = username
        .map(|u| u.split('@').next().unwrap_or(u).trim().to_lowercase())
        .unwrap_or_default();

    for caps in BOTS_LIST.captures_iter(text) {
        let kind = caps[1].to_lowercase();
        let names: Vec<String> = caps[2]
            .split(',')
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        let listed = names.iter().any(|n| n == "all" || (!account.is_empty() && *n == account));

        let excluded = match kind.as_str() {
            "deny" => listed,
            _ => names.iter().any(|n| n == "none") || !listed,
        };
        if excluded {
            return Some(caps[0].to_string());
        }
    }

    None
}

/// `Category:Foo` for `Foo` or `Category:Foo`
pub fn category_title(name: &str) -> String {
    let name = name.trim();
    match name.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("category:") => {
            format!("Category:{}", name[9..].trim())
        }
        _ => format!("Category:{}", name),
    }
}
