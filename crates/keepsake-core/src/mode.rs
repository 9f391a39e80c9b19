//! Interview modes and the selector that picks one for a new session.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};
use tracing::debug;

use crate::{
  Error, Result,
  session::SessionHistory,
  theme::{Sensitivity, Theme, label_key},
};

/// A theme mentioned at least this often across history is recurrent.
pub const RECURRENT_MENTIONS: u32 = 3;

/// The interview modes. The string forms are the snake_case variant names.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InterviewMode {
  #[default]
  General,
  DeepDive,
  FamilyDynamics,
  Legacy,
  Childhood,
}

/// Tie-break order for automatic selection, highest first.
pub const SELECTION_PRIORITY: [InterviewMode; 5] = [
  InterviewMode::DeepDive,
  InterviewMode::FamilyDynamics,
  InterviewMode::Legacy,
  InterviewMode::Childhood,
  InterviewMode::General,
];

/// Modes whose sessions count as having addressed a theme.
const ADDRESSING_MODES: [InterviewMode; 2] =
  [InterviewMode::FamilyDynamics, InterviewMode::Legacy];

impl InterviewMode {
  /// Parse a mode name, failing with [`Error::UnrecognizedMode`].
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name.trim())
      .map_err(|_| Error::UnrecognizedMode(name.to_owned()))
  }

  /// Default cap on interviewee turns for a session in this mode.
  pub fn default_max_turns(self) -> u32 {
    match self {
      Self::General => 40,
      Self::DeepDive | Self::FamilyDynamics | Self::Childhood => 30,
      Self::Legacy => 25,
    }
  }

  /// Label words that place a theme within this mode's territory. A plain
  /// word must equal a label token, a word ending in `*` is a stem matched
  /// against token prefixes, and a phrase (space or hyphen) matches as a
  /// substring of the label.
  pub fn affinity_keywords(self) -> &'static [&'static str] {
    match self {
      Self::General | Self::DeepDive => &[],
      Self::FamilyDynamics => &[
        "family", "families", "marri*", "wedding*", "sibling*", "brother*",
        "sister*", "mother*", "father*", "dad", "dads", "parent*", "son",
        "sons", "daughter*", "divorce*", "conflict*", "estrange*", "in-law",
        "grandchild*", "husband*", "wife", "wives",
      ],
      Self::Legacy => &[
        "legacy", "value*", "lesson*", "advice", "wisdom", "faith", "belief*",
        "remember*", "career*", "work", "working", "achievement*", "proud",
        "pride", "regret*", "community", "charity", "charities",
      ],
      Self::Childhood => &[
        "childhood", "child", "children", "school*", "growing up", "hometown",
        "boyhood", "girlhood", "youth", "young", "teen", "teens", "teenage*",
        "born", "village",
      ],
    }
  }

  /// Whether this mode would cover `theme` when it is a selection candidate.
  fn covers(self, theme: &Theme) -> bool {
    match self {
      Self::General => false,
      Self::DeepDive => theme.mention_count >= RECURRENT_MENTIONS,
      _ => {
        let key = label_key(&theme.label);
        self
          .affinity_keywords()
          .iter()
          .any(|kw| keyword_matches(&key, kw))
      }
    }
  }
}

fn keyword_matches(key: &str, keyword: &str) -> bool {
  if keyword.contains([' ', '-']) {
    return key.contains(keyword);
  }
  let mut tokens = key.split([' ', '-', '/']);
  match keyword.strip_suffix('*') {
    Some(stem) => tokens.any(|token| token.starts_with(stem)),
    None => tokens.any(|token| token == keyword),
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// Choose the effective mode for a new session.
///
/// An explicitly requested mode always wins and an unrecognized one is an
/// error. Without a request, a first session is `general`; later sessions
/// pick the mode covering the most sensitive or recurrent themes not yet
/// addressed by a `family_dynamics` or `legacy` session.
pub fn select(
  requested: Option<&str>,
  history: &SessionHistory,
) -> Result<InterviewMode> {
  if let Some(name) = requested {
    return InterviewMode::parse(name);
  }
  if history.is_first_session() {
    return Ok(InterviewMode::General);
  }

  let candidates: Vec<Theme> = history
    .aggregate_themes()
    .into_iter()
    .filter(|t| {
      t.sensitivity == Sensitivity::Sensitive
        || t.mention_count >= RECURRENT_MENTIONS
    })
    .filter(|t| !history.addressed_in(&t.label, &ADDRESSING_MODES))
    .collect();

  let mut best = InterviewMode::General;
  let mut best_coverage = 0;
  for mode in SELECTION_PRIORITY {
    let coverage = candidates.iter().filter(|t| mode.covers(t)).count();
    if coverage > best_coverage {
      best = mode;
      best_coverage = coverage;
    }
  }

  debug!(
    candidates = candidates.len(),
    mode = %best,
    coverage = best_coverage,
    "selected mode from history"
  );
  Ok(best)
}

/// Every mode, in declaration order.
pub fn all_modes() -> impl Iterator<Item = InterviewMode> { InterviewMode::iter() }

// ─── Tests ────────────────────────────────────────────────────────────────────
