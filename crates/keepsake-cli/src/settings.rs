//! Layered configuration for the `keepsake` binary.
//!
//! Precedence, lowest first: defaults, the TOML file, `KEEPSAKE_*`
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use keepsake_core::config::{InterviewConfig, PlannerSettings};
use serde::Deserialize;

/// Everything the binary needs, deserialised from `keepsake.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
  /// SQLite archive location. Without one, history lives only as long as
  /// the process.
  pub archive_path: Option<PathBuf>,
  pub interview:    InterviewConfig,
  pub planner:      PlannerSettings,
}

/// Per-session overrides accepted on the command line.
#[derive(Args, Debug, Default)]
pub struct InterviewArgs {
  /// Name of the person being remembered.
  #[arg(long)]
  pub subject: Option<String>,

  /// Another name the subject went by. Repeatable.
  #[arg(long = "alias", value_name = "NAME")]
  pub aliases: Vec<String>,

  /// Name of the person being interviewed.
  #[arg(long)]
  pub interviewee: Option<String>,

  /// The interviewee's relationship to the subject, e.g. "daughter".
  #[arg(long)]
  pub relationship: Option<String>,

  /// Interview mode; omit to let the session history decide.
  #[arg(long)]
  pub mode: Option<String>,

  /// Stable pair id, overriding the key derived from both names.
  #[arg(long)]
  pub pair_id: Option<String>,
}

impl KeepsakeConfig {
  /// Read the file at `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("KEEPSAKE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise keepsake configuration")?;
    cfg.archive_path = cfg.archive_path.as_deref().map(expand_tilde);
    Ok(cfg)
  }

  /// CLI flags override config file, which overrides defaults.
  pub fn apply(&mut self, args: InterviewArgs, archive: Option<PathBuf>) {
    let interview = &mut self.interview;
    if let Some(subject) = args.subject {
      interview.subject_name = subject;
    }
    if !args.aliases.is_empty() {
      interview.subject_aliases = args.aliases;
    }
    if let Some(name) = args.interviewee {
      interview.interviewee_name = name;
    }
    interview.declared_relationship =
      args.relationship.or(interview.declared_relationship.take());
    interview.requested_mode = args.mode.or(interview.requested_mode.take());
    interview.pair_id = args.pair_id.or(interview.pair_id.take());

    if let Some(path) = archive {
      self.archive_path = Some(expand_tilde(&path));
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
