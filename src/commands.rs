//! CLI commands: fix, run, title
//!
//! Results go to stdout as compact JSON, progress to stderr.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use refjanitor::bot::{Janitor, RunOptions};
use refjanitor::config::JanitorConfig;
use refjanitor::pipeline::{ChangeManifest, Pipeline};
use refjanitor::title::{HttpTitleResolver, OfflineResolver, ResolvedTitle, TitleResolver};
use refjanitor::upgrade::BareUrlUpgrader;
use refjanitor::wiki::{AuditLog, Criterion, LocalWiki, MediaWikiClient, PageStore, Worklist};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

#[derive(Args)]
pub struct FixArgs {
    /// Wikitext files or glob patterns
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<String>,

    /// Rewrite the files in place
    #[arg(long)]
    pub write: bool,

    /// Print the transformed text instead of the JSON report (single file)
    #[arg(long, conflicts_with = "write")]
    pub print: bool,

    /// Do not fetch titles; citations get "No title"
    #[arg(long)]
    pub no_fetch: bool,

    /// Access date for new citations (YYYY-MM-DD, default: today UTC)
    #[arg(long, value_parser = parse_date)]
    pub access_date: Option<NaiveDate>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Process members of this category
    #[arg(long, conflicts_with = "page")]
    pub category: Option<String>,

    /// Process this page (repeatable)
    #[arg(long)]
    pub page: Vec<String>,

    /// Transform and report, but never save
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many pages
    #[arg(long)]
    pub limit: Option<usize>,

    /// Work on a directory of .wiki files instead of a live wiki
    #[arg(long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// MediaWiki api.php endpoint (overrides config)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bot-password login name
    #[arg(long, env = "REFJANITOR_USERNAME")]
    pub username: Option<String>,

    /// Bot password
    #[arg(long, env = "REFJANITOR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Do not fetch titles; citations get "No title"
    #[arg(long)]
    pub no_fetch: bool,

    /// Seconds to wait after each save (overrides config)
    #[arg(long)]
    pub edit_delay: Option<u64>,
}

#[derive(Args)]
pub struct TitleArgs {
    /// URL to resolve
    pub url: String,

    /// Access date for the citation (YYYY-MM-DD, default: today UTC)
    #[arg(long, value_parser = parse_date)]
    pub access_date: Option<NaiveDate>,
}

/// Per-file result (compact)
#[derive(Debug, Serialize)]
pub struct FixResult {
    pub file: String,
    pub changed: bool,
    #[serde(skip_serializing_if = "ChangeManifest::is_empty")]
    pub actions: ChangeManifest,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub named: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upgraded: Vec<String>,
    pub marker_removed: bool,
}

#[derive(Debug, Serialize)]
pub struct FixReport {
    pub changed: usize,
    pub unchanged: usize,
    pub files: Vec<FixResult>,
}

#[derive(Debug, Serialize)]
pub struct TitleOutput {
    pub url: String,
    pub found: bool,
    pub title: String,
    pub citation: String,
}

/// Either a real HTTP resolver or the offline fallback, picked at runtime
enum Resolver {
    Http(HttpTitleResolver),
    Offline(OfflineResolver),
}

impl Resolver {
    fn from_config(config: &JanitorConfig, no_fetch: bool) -> Result<Self> {
        if no_fetch {
            return Ok(Resolver::Offline(OfflineResolver));
        }
        let resolver = HttpTitleResolver::new(&config.resolver_config())
            .context("Failed to build HTTP client")?;
        Ok(Resolver::Http(resolver))
    }
}

impl TitleResolver for Resolver {
    async fn resolve(&self, url: &str) -> ResolvedTitle {
        match self {
            Resolver::Http(r) => r.resolve(url).await,
            Resolver::Offline(r) => r.resolve(url).await,
        }
    }
}

fn build_pipeline(resolver: Resolver, config: &JanitorConfig, access_date: NaiveDate) -> Pipeline<Resolver> {
    let upgrader = BareUrlUpgrader::new(resolver, access_date)
        .with_synthesizer(config.synthesizer())
        .with_markup(config.markup());
    Pipeline::new(upgrader)
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Run the fix command
pub async fn run_fix(args: FixArgs, config: &JanitorConfig) -> Result<()> {
    let files = expand_files(&args.files)?;

    if files.is_empty() {
        eprintln!("No files found.");
        std::process::exit(1);
    }
    if args.print && files.len() > 1 {
        bail!("--print works on a single file");
    }

    let resolver = Resolver::from_config(config, args.no_fetch)?;
    let pipeline = build_pipeline(resolver, config, args.access_date.unwrap_or_else(today));

    eprintln!(
        "Fixing {} file{}...",
        files.len(),
        if files.len() == 1 { "" } else { "s" }
    );

    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        eprintln!("  -> {}", file.display());

        let content = fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        let transformed = pipeline.transform(&content).await;

        if args.print {
            print!("{}", transformed.text);
            return Ok(());
        }

        // Dropping the cleanup marker alone is not an edit.
        if args.write && transformed.changed {
            fs::write(file, &transformed.text)
                .await
                .with_context(|| format!("Failed to write file: {}", file.display()))?;
        }

        results.push(FixResult {
            file: file.display().to_string(),
            changed: transformed.changed,
            actions: transformed.manifest,
            named: transformed.named,
            upgraded: transformed.upgraded,
            marker_removed: transformed.marker_removed,
        });
    }

    let changed = results.iter().filter(|r| r.changed).count();
    let report = FixReport {
        changed,
        unchanged: results.len() - changed,
        files: results,
    };

    println!("{}", serde_json::to_string(&report)?);
    eprintln!("Done: {}/{} changed", report.changed, report.files.len());

    Ok(())
}

/// Expand glob patterns; plain paths pass through untouched
fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            for entry in glob::glob(pattern).with_context(|| format!("Invalid pattern: {}", pattern))? {
                let path = entry?;
                if path.is_file() {
                    files.push(path);
                }
            }
        } else {
            files.push(PathBuf::from(pattern));
        }
    }

    Ok(files)
}

/// Run the bot loop
pub async fn run_bot(args: RunArgs, config: &JanitorConfig) -> Result<()> {
    let criterion = match (&args.category, args.page.is_empty()) {
        (Some(category), _) => Criterion::Category(category.clone()),
        (None, false) => Criterion::Pages(args.page.clone()),
        (None, true) => {
            eprintln!("Usage:");
            eprintln!("  refjanitor run --category <NAME>    Process category members");
            eprintln!("  refjanitor run --page <TITLE>...    Process specific pages");
            std::process::exit(1);
        }
    };

    let resolver = Resolver::from_config(config, args.no_fetch)?;
    let pipeline = build_pipeline(resolver, config, today());

    let options = RunOptions {
        dry_run: args.dry_run,
        limit: args.limit,
        edit_delay: args
            .edit_delay
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.edit_delay()),
        summary_prefix: config.summary_prefix.clone(),
    };

    let username = args.username.clone().or_else(|| config.wiki.username.clone());

    if let Some(dir) = &args.local_dir {
        eprintln!("Working on local pages in {}", dir.display());
        let wiki = LocalWiki::new(dir, username);
        return report_run(&wiki, &pipeline, &criterion, options).await;
    }

    let api_url = args.api_url.as_deref().unwrap_or(&config.wiki.api_url);
    let mut wiki = MediaWikiClient::new(api_url, &config.wiki.user_agent)
        .context("Failed to build HTTP client")?
        .with_log_page(config.wiki.log_page.clone())
        .with_namespace(config.wiki.namespace);

    match (&username, &args.password) {
        (Some(user), Some(password)) => {
            wiki.login(user, password)
                .await
                .with_context(|| format!("Failed to log in to {}", api_url))?;
        }
        _ if !args.dry_run => {
            bail!("Saving needs --username and --password (or REFJANITOR_USERNAME / REFJANITOR_PASSWORD)");
        }
        _ => eprintln!("Not logged in (dry run)"),
    }

    report_run(&wiki, &pipeline, &criterion, options).await
}

async fn report_run<W>(
    wiki: &W,
    pipeline: &Pipeline<Resolver>,
    criterion: &Criterion,
    options: RunOptions,
) -> Result<()>
where
    W: PageStore + Worklist + AuditLog,
{
    let janitor = Janitor::new(wiki, pipeline, options);
    let report = janitor
        .run(criterion)
        .await
        .context("Failed to build worklist")?;

    println!("{}", serde_json::to_string(&report)?);
    eprintln!(
        "Done: {} saved, {} unchanged, {} skipped, {} failed",
        report.saved, report.unchanged, report.skipped, report.failed
    );

    Ok(())
}

/// Resolve one URL and show the citation it would get
pub async fn run_title(args: TitleArgs, config: &JanitorConfig) -> Result<()> {
    let resolver = HttpTitleResolver::new(&config.resolver_config())
        .context("Failed to build HTTP client")?;
    let title = resolver.resolve(&args.url).await;
    let citation = config
        .synthesizer()
        .synthesize(&args.url, &title, args.access_date.unwrap_or_else(today));

    let output = TitleOutput {
        url: args.url,
        found: title.is_found(),
        title: title.to_string(),
        citation: citation.to_string(),
    };
    println!("{}", serde_json::to_string(&output)?);

    Ok(())
}
