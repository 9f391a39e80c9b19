//! `keepsake`: operator harness for Keepsake interview sessions.
//!
//! Reads `keepsake.toml` (or the path given with `--config`), opens the
//! session archive, and runs one interview over a JSON-lines stream:
//! utterance features on stdin, one directive per line on stdout. Logs go to
//! stderr.
//!
//! ```
//! keepsake --subject "Robert Chen" --interviewee "Sarah Chen" run < features.jsonl
//! keepsake --subject "Robert Chen" --interviewee "Sarah Chen" history
//! ```

mod driver;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use keepsake_core::{archive::{MemoryArchive, SessionArchive}, interview::Interview};
use keepsake_store_sqlite::SqliteArchive;
use settings::{InterviewArgs, KeepsakeConfig};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keepsake", version, about = "Session-aware biographical interview orchestrator")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, env = "KEEPSAKE_CONFIG", default_value = "keepsake.toml")]
  config: PathBuf,

  /// SQLite archive path, overriding `archive_path`.
  #[arg(long, value_name = "FILE")]
  archive: Option<PathBuf>,

  #[command(flatten)]
  interview: InterviewArgs,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run one session over stdin/stdout and archive it on exit.
  Run,
  /// Print the archived session summaries for the pair, one JSON per line.
  History,
  /// List every pair with archived sessions.
  Pairs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing. Stdout carries directives, so logs go to stderr.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut cfg = KeepsakeConfig::load(&cli.config)?;
  cfg.apply(cli.interview, cli.archive);

  match &cfg.archive_path {
    Some(path) => {
      let archive = SqliteArchive::open(path)
        .await
        .with_context(|| format!("failed to open archive at {path:?}"))?;
      if let Command::Pairs = cli.command {
        for key in archive.pairs().await.context("failed to list pairs")? {
          println!("{key}");
        }
        return Ok(());
      }
      execute(cli.command, &cfg, &archive).await
    }
    None => {
      if let Command::Pairs = cli.command {
        bail!("`pairs` needs an archive_path");
      }
      warn!("no archive_path configured, session history will not persist");
      execute(cli.command, &cfg, &MemoryArchive::new()).await
    }
  }
}

async fn execute<A: SessionArchive>(
  command: Command,
  cfg: &KeepsakeConfig,
  archive: &A,
) -> anyhow::Result<()> {
  match command {
    Command::Run => {
      let mut interview = Interview::start(&cfg.interview, &cfg.planner, archive)
        .await
        .context("failed to start interview")?;

      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      let run = driver::run(&mut interview, stdin, tokio::io::stdout()).await;

      // Archive whatever happened, even when the stream failed.
      let summary = interview
        .close(archive)
        .await
        .context("failed to archive session")?;
      let directives = run?;
      info!(
        directives,
        turns = summary.turn_count,
        conclusion = ?summary.conclusion,
        "session closed"
      );
    }
    Command::History => {
      cfg.interview.validate().context("invalid interview configuration")?;
      let key = cfg.interview.archive_key();
      let history = archive
        .load(&key)
        .await
        .with_context(|| format!("failed to load history for {key}"))?;
      for summary in history.summaries() {
        println!("{}", serde_json::to_string(summary)?);
      }
    }
    Command::Pairs => bail!("`pairs` needs an archive_path"),
  }
  Ok(())
}
