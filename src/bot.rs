//! The bot loop: read a page, transform it, save it, log it
//!
//! Pages are processed one at a time. A page that cannot be saved is
//! reported and skipped; only failing to build the worklist stops a run.

use crate::error::{Error, SaveError};
use crate::markup::Markup;
use crate::pipeline::{ChangeManifest, Pipeline, DEFAULT_SUMMARY_PREFIX};
use crate::title::TitleResolver;
use crate::wiki::{AuditLog, Criterion, PageStore, RevisionId, Worklist};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Knobs for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Transform and report, never save
    pub dry_run: bool,
    /// Stop after this many pages
    pub limit: Option<usize>,
    /// Pause after each successful save
    pub edit_delay: Duration,
    pub summary_prefix: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            edit_delay: Duration::from_secs(10),
            summary_prefix: DEFAULT_SUMMARY_PREFIX.to_string(),
        }
    }
}

/// What happened to one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Saved,
    /// Dry run: would have been saved
    WouldSave,
    Unchanged,
    Missing,
    /// Save refused (bot exclusion, protection, conflict)
    Skipped,
    Failed,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Saved => write!(f, "saved"),
            PageStatus::WouldSave => write!(f, "would_save"),
            PageStatus::Unchanged => write!(f, "unchanged"),
            PageStatus::Missing => write!(f, "missing"),
            PageStatus::Skipped => write!(f, "skipped"),
            PageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-page result (compact)
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub page: String,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "ChangeManifest::is_empty")]
    pub actions: ChangeManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upgraded: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    fn new(page: &str, status: PageStatus) -> Self {
        Self {
            page: page.to_string(),
            status,
            actions: ChangeManifest::default(),
            summary: None,
            revision: None,
            upgraded: Vec::new(),
            error: None,
        }
    }
}

/// Full run report (compact)
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub saved: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pages: Vec<PageResult>,
}

impl RunReport {
    fn push(&mut self, result: PageResult) {
        self.total += 1;
        match result.status {
            PageStatus::Saved | PageStatus::WouldSave => self.saved += 1,
            PageStatus::Unchanged => self.unchanged += 1,
            PageStatus::Missing | PageStatus::Skipped => self.skipped += 1,
            PageStatus::Failed => self.failed += 1,
        }
        self.pages.push(result);
    }
}

pub struct Janitor<'a, W, R, M> {
    wiki: &'a W,
    pipeline: &'a Pipeline<R, M>,
    options: RunOptions,
}

impl<'a, W, R, M> Janitor<'a, W, R, M>
where
    W: PageStore + Worklist + AuditLog,
    R: TitleResolver,
    M: Markup,
{
    pub fn new(wiki: &'a W, pipeline: &'a Pipeline<R, M>, options: RunOptions) -> Self {
        Self {
            wiki,
            pipeline,
            options,
        }
    }

    /// Process every page the criterion selects
    pub async fn run(&self, criterion: &Criterion) -> Result<RunReport, Error> {
        let mut pages = self.wiki.list_candidate_pages(criterion).await?;
        if let Some(limit) = self.options.limit {
            pages.truncate(limit);
        }
        info!(count = pages.len(), "pages to process");

        let mut report = RunReport::default();
        for page in &pages {
            let result = self.process_page(page).await;
            report.push(result);
        }

        Ok(report)
    }

    pub async fn process_page(&self, page: &str) -> PageResult {
        let original = match self.wiki.get_text(page).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!(page, "page does not exist, skipping");
                return PageResult::new(page, PageStatus::Missing);
            }
            Err(e) => {
                warn!(page, error = %e, "could not read page");
                let mut result = PageResult::new(page, PageStatus::Failed);
                result.error = Some(e.to_string());
                return result;
            }
        };

        let transformed = self.pipeline.transform(&original).await;
        if !transformed.changed {
            info!(page, "nothing to fix");
            return PageResult::new(page, PageStatus::Unchanged);
        }

        let summary = transformed.manifest.summary(&self.options.summary_prefix);
        let mut result = PageResult::new(page, PageStatus::WouldSave);
        result.actions = transformed.manifest;
        result.upgraded = transformed.upgraded;
        result.summary = Some(summary.clone());

        if self.options.dry_run {
            info!(page, summary = %summary, "dry run, not saving");
            return result;
        }

        match self.wiki.put_text(page, &transformed.text, &summary).await {
            Ok(revision) => {
                info!(page, revision, summary = %summary, "saved");
                result.status = PageStatus::Saved;
                result.revision = Some(revision);

                if let Err(e) = self.wiki.append_log(page, &summary, revision).await {
                    warn!(page, error = %e, "edit saved but log append failed");
                }

                if !self.options.edit_delay.is_zero() {
                    tokio::time::sleep(self.options.edit_delay).await;
                }
            }
            Err(e) => {
                result.status = save_failure_status(&e);
                if e.is_skippable() {
                    info!(page, reason = %e, "save refused, skipping");
                } else {
                    warn!(page, error = %e, "save failed");
                }
                result.error = Some(e.to_string());
            }
        }

        result
    }
}

fn save_failure_status(error: &SaveError) -> PageStatus {
    if error.is_skippable() {
        PageStatus::Skipped
    } else {
        PageStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrade::tests::{date, StubResolver};
    use crate::upgrade::BareUrlUpgrader;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory wiki recording saves and log lines
    #[derive(Default)]
    struct MemoryWiki {
        pages: Mutex<HashMap<String, String>>,
        protected: Vec<String>,
        log: Mutex<Vec<String>>,
        fail_log: bool,
    }

    impl MemoryWiki {
        fn with_page(self, title: &str, text: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(title.to_string(), text.to_string());
            self
        }

        fn text(&self, title: &str) -> Option<String> {
            self.pages.lock().unwrap().get(title).cloned()
        }
    }

    impl PageStore for MemoryWiki {
        async fn get_text(&self, page: &str) -> Result<Option<String>, Error> {
            Ok(self.text(page))
        }

        async fn put_text(&self, page: &str, text: &str, _comment: &str) -> Result<RevisionId, SaveError> {
            if self.protected.iter().any(|p| p == page) {
                return Err(SaveError::NotPermitted {
                    page: page.to_string(),
                    reason: "protectedpage".to_string(),
                });
            }
            self.pages
                .lock()
                .unwrap()
                .insert(page.to_string(), text.to_string());
            Ok(100)
        }
    }

    impl Worklist for MemoryWiki {
        async fn list_candidate_pages(&self, criterion: &Criterion) -> Result<Vec<String>, Error> {
            match criterion {
                Criterion::Pages(pages) => Ok(pages.clone()),
                Criterion::Category(_) => {
                    let mut all: Vec<String> = self.pages.lock().unwrap().keys().cloned().collect();
                    all.sort();
                    Ok(all)
                }
            }
        }
    }

    impl AuditLog for MemoryWiki {
        async fn append_log(&self, page: &str, comment: &str, revision: RevisionId) -> Result<(), Error> {
            if self.fail_log {
                return Err(Error::UnexpectedResponse("log page locked".to_string()));
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("{} {} {}", page, comment, revision));
            Ok(())
        }
    }

    fn pipeline() -> Pipeline<StubResolver> {
        Pipeline::new(BareUrlUpgrader::new(StubResolver::default(), date()))
    }

    fn options() -> RunOptions {
        RunOptions {
            edit_delay: Duration::ZERO,
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn test_run_saves_and_logs() {
        let wiki = MemoryWiki::default()
            .with_page("Dupes", "a<ref>X</ref> b<ref>X</ref>")
            .with_page("Clean", "nothing here");
        let pipeline = pipeline();
        let janitor = Janitor::new(&wiki, &pipeline, options());

        let report = janitor
            .run(&Criterion::Category("Anything".to_string()))
            .await
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.saved, 1);
        assert_eq!(report.unchanged, 1);
        assert!(wiki.text("Dupes").unwrap().contains(" />"));
        assert_eq!(
            wiki.log.lock().unwrap().clone(),
            vec!["Dupes Bot: named duplicate references 100".to_string()]
        );
    }

    #[tokio::test]
    async fn test_not_permitted_is_skipped() {
        let mut wiki = MemoryWiki::default()
            .with_page("Locked", "<ref>X</ref><ref>X</ref>")
            .with_page("Open", "<ref>Y</ref><ref>Y</ref>");
        wiki.protected.push("Locked".to_string());
        let pipeline = pipeline();
        let janitor = Janitor::new(&wiki, &pipeline, options());

        let report = janitor
            .run(&Criterion::Pages(vec!["Locked".to_string(), "Open".to_string()]))
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.saved, 1);
        assert_eq!(report.pages[0].status, PageStatus::Skipped);
        assert_eq!(wiki.text("Locked").unwrap(), "<ref>X</ref><ref>X</ref>");
    }

    #[tokio::test]
    async fn test_missing_page() {
        let wiki = MemoryWiki::default();
        let pipeline = pipeline();
        let janitor = Janitor::new(&wiki, &pipeline, options());
        let result = janitor.process_page("Nope").await;
        assert_eq!(result.status, PageStatus::Missing);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_save() {
        let wiki = MemoryWiki::default().with_page("P", "<ref>https://example.com/a</ref>");
        let pipeline = pipeline();
        let janitor = Janitor::new(
            &wiki,
            &pipeline,
            RunOptions {
                dry_run: true,
                ..options()
            },
        );

        let result = janitor.process_page("P").await;
        assert_eq!(result.status, PageStatus::WouldSave);
        assert_eq!(
            result.summary.as_deref(),
            Some("Bot: converted bare refs to cite web")
        );
        assert_eq!(result.upgraded, vec!["https://example.com/a".to_string()]);
        assert_eq!(wiki.text("P").unwrap(), "<ref>https://example.com/a</ref>");
        assert!(wiki.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_failure_keeps_save() {
        let wiki = MemoryWiki {
            fail_log: true,
            ..MemoryWiki::default()
        }
        .with_page("P", "<ref>X</ref><ref>X</ref>");
        let pipeline = pipeline();
        let janitor = Janitor::new(&wiki, &pipeline, options());

        let result = janitor.process_page("P").await;
        assert_eq!(result.status, PageStatus::Saved);
        assert_eq!(result.revision, Some(100));
    }

    #[tokio::test]
    async fn test_limit() {
        let wiki = MemoryWiki::default()
            .with_page("A", "x")
            .with_page("B", "y");
        let pipeline = pipeline();
        let janitor = Janitor::new(
            &wiki,
            &pipeline,
            RunOptions {
                limit: Some(1),
                ..options()
            },
        );
        let report = janitor
            .run(&Criterion::Category("c".to_string()))
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.pages[0].page, "A");
    }

    #[test]
    fn test_report_json() {
        let mut report = RunReport::default();
        report.push(PageResult::new("Foo", PageStatus::Unchanged));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"total":1,"saved":0,"unchanged":1,"skipped":0,"failed":0,"pages":[{"page":"Foo","status":"unchanged"}]}"#
        );
    }
}
