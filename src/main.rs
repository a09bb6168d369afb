//! refjanitor CLI
//!
//! Names duplicate references and turns bare URLs into citation templates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refjanitor::config::JanitorConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{run_bot, run_fix, run_title, FixArgs, RunArgs, TitleArgs};

#[derive(Parser)]
#[command(name = "refjanitor")]
#[command(version)]
#[command(about = "Citation cleanup for wiki pages")]
#[command(long_about = "Names duplicate <ref>s and converts bare URLs into {{cite web}} / {{cite news}} templates.\n\nCommands:\n  fix    Fix local wikitext files\n  run    Run the bot over wiki pages\n  title  Resolve one URL into a citation")]
struct Cli {
    /// Config file (default: ./refjanitor.yaml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix wikitext files on disk
    Fix(FixArgs),
    /// Process wiki pages: read, fix, save, log
    Run(RunArgs),
    /// Fetch a URL's title and print the citation it would get
    Title(TitleArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refjanitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = JanitorConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Fix(args) => run_fix(args, &config).await,
        Commands::Run(args) => run_bot(args, &config).await,
        Commands::Title(args) => run_title(args, &config).await,
    }
}
