//! The two people every interview is about, and the key that pairs them.
//!
//! All persisted state is keyed by the (subject, interviewee) pair so that
//! sequential sessions with the same family member share one history.

use serde::{Deserialize, Serialize};

/// The deceased person being documented. Immutable for a session set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub name:    String,
  /// Other names the subject went by, e.g. a maiden name or nickname.
  #[serde(default)]
  pub aliases: Vec<String>,
}

impl Subject {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), aliases: Vec::new() }
  }

  pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
    self.aliases = aliases;
    self
  }
}

/// The living participant being interviewed about the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interviewee {
  pub name:                    String,
  /// Relationship supplied at configuration time, e.g. "daughter".
  pub relationship_to_subject: Option<String>,
}

impl Interviewee {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), relationship_to_subject: None }
  }

  pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
    self.relationship_to_subject = Some(relationship.into());
    self
  }
}

// ─── Pair key ────────────────────────────────────────────────────────────────

/// Identifies one (subject, interviewee) pair in the session archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveKey {
  pub subject:     String,
  pub interviewee: String,
}

impl ArchiveKey {
  /// Derive the key from both names: trimmed, whitespace collapsed and
  /// lowercased, so "Sarah  Chen" and "sarah chen" share a history.
  pub fn for_pair(subject: &Subject, interviewee: &Interviewee) -> Self {
    Self {
      subject:     fold_name(&subject.name),
      interviewee: fold_name(&interviewee.name),
    }
  }

  /// An operator-supplied pair id isolates the history from name changes.
  /// The id is stored in the interviewee slot under a fixed subject marker.
  pub fn from_pair_id(pair_id: &str) -> Self {
    Self {
      subject:     "#pair".to_owned(),
      interviewee: pair_id.trim().to_owned(),
    }
  }
}

impl std::fmt::Display for ArchiveKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} / {}", self.subject, self.interviewee)
  }
}

// ─── Surname detection ───────────────────────────────────────────────────────

/// True when the interviewee's terminal name token matches the terminal token
/// of the subject's name or of any alias.
pub fn shares_surname(subject: &Subject, interviewee: &Interviewee) -> bool {
  let Some(theirs) = terminal_token(&interviewee.name) else {
    return false;
  };

  std::iter::once(&subject.name)
    .chain(subject.aliases.iter())
    .filter_map(|name| terminal_token(name))
    .any(|token| token == theirs)
}

fn terminal_token(name: &str) -> Option<String> {
  name
    .split_whitespace()
    .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
    .filter(|t| !t.is_empty())
    .next_back()
    .map(str::to_lowercase)
}

fn fold_name(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
