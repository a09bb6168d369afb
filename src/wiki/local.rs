//! Directory-backed wiki: one `.wiki` file per page, log as a text file
//!
//! Lets the bot loop run offline against a checkout of page sources.

use super::{bot_exclusion, category_title, log_entry, AuditLog, Criterion, PageStore, RevisionId, Worklist, LOG_HEADER};
use crate::error::{Error, SaveError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const PAGE_EXTENSION: &str = "wiki";
pub const LOG_FILE: &str = "edit-log.wiki";

pub struct LocalWiki {
    root: PathBuf,
    username: Option<String>,
    next_revision: AtomicU64,
}

impl LocalWiki {
    pub fn new(root: impl Into<PathBuf>, username: Option<String>) -> Self {
        Self {
            root: root.into(),
            username,
            next_revision: AtomicU64::new(1),
        }
    }

    /// `User:Bot/sandbox` ⇒ `<root>/User:Bot%2Fsandbox.wiki`
    pub fn page_path(&self, page: &str) -> PathBuf {
        let file = page.trim().replace('/', "%2F").replace(' ', "_");
        self.root.join(format!("{}.{}", file, PAGE_EXTENSION))
    }

    fn page_name(path: &Path) -> Option<String> {
        if path.extension()? != PAGE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if format!("{}.{}", stem, PAGE_EXTENSION) == LOG_FILE {
            return None;
        }
        Some(stem.replace("%2F", "/").replace('_', " "))
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    async fn all_pages(&self) -> Result<Vec<(String, PathBuf)>, Error> {
        let mut pages = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(name) = Self::page_name(&path) {
                pages.push((name, path));
            }
        }
        pages.sort();
        Ok(pages)
    }
}

impl PageStore for LocalWiki {
    async fn get_text(&self, page: &str) -> Result<Option<String>, Error> {
        match fs::read_to_string(self.page_path(page)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn put_text(&self, page: &str, text: &str, _comment: &str) -> Result<RevisionId, SaveError> {
        if let Some(reason) = bot_exclusion(text, self.username.as_deref()) {
            return Err(SaveError::NotPermitted {
                page: page.to_string(),
                reason,
            });
        }

        let current = self.get_text(page).await?;
        if current.as_deref() == Some(text) {
            return Err(SaveError::NoChange {
                page: page.to_string(),
            });
        }

        fs::write(self.page_path(page), text).await.map_err(Error::Io)?;
        Ok(self.next_revision.fetch_add(1, Ordering::SeqCst))
    }
}

impl Worklist for LocalWiki {
    async fn list_candidate_pages(&self, criterion: &Criterion) -> Result<Vec<String>, Error> {
        match criterion {
            Criterion::Pages(pages) => Ok(pages.clone()),
            Criterion::Category(name) => {
                let needle = format!("[[{}", category_title(name)).to_lowercase();
                let mut members = Vec::new();
                for (page, path) in self.all_pages().await? {
                    let text = fs::read_to_string(&path).await?;
                    if text.to_lowercase().contains(&needle) {
                        members.push(page);
                    }
                }
                Ok(members)
            }
        }
    }
}

impl AuditLog for LocalWiki {
    async fn append_log(&self, page: &str, comment: &str, revision: RevisionId) -> Result<(), Error> {
        let path = self.log_path();
        let fresh = !path.exists();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        if fresh {
            file.write_all(LOG_HEADER.as_bytes()).await?;
        }
        file.write_all(log_entry(page, comment, revision, Utc::now()).as_bytes())
            .await?;
        file.flush().await?;

        Ok(())
    }
}
