//! Session state for one interview sitting, and the summaries that outlive it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  mode::InterviewMode,
  relationship::RelationshipFact,
  theme::{Sensitivity, Theme, ThemeTracker, label_key},
};

// ─── Status and care flags ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  #[default]
  Active,
  Paused,
  Concluded,
}

/// Emotional-care actions that must be addressed before the topic advances.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CareAction {
  OfferBreak,
  AcknowledgeEmotion,
  DeferTopic,
}

/// An unresolved conversational topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenThread {
  /// Theme label, as first seen.
  pub label:       String,
  pub opened_turn: u32,
  /// Consecutive turns without any overlap with this thread.
  pub idle_turns:  u32,
}

impl OpenThread {
  pub fn new(label: impl Into<String>, opened_turn: u32) -> Self {
    Self { label: label.into(), opened_turn, idle_turns: 0 }
  }

  pub fn matches(&self, label: &str) -> bool {
    label_key(&self.label) == label_key(label)
  }
}

// ─── SessionState ────────────────────────────────────────────────────────────

/// One interview sitting. Mutated only by the turn planner.
#[derive(Debug, Clone)]
pub struct SessionState {
  pub session_id:           Uuid,
  pub mode:                 InterviewMode,
  /// Monotonic; 0 is the opening directive, each utterance adds one.
  pub turn_index:           u32,
  pub open_threads:         Vec<OpenThread>,
  /// Threads the interviewee asked to skip; they can ask to return later.
  pub deferred_threads:     Vec<OpenThread>,
  pub pending_care_actions: BTreeSet<CareAction>,
  pub status:               SessionStatus,
  pub themes:               ThemeTracker,
  pub started_at:           DateTime<Utc>,
}

impl SessionState {
  pub fn new(mode: InterviewMode) -> Self {
    Self {
      session_id: Uuid::new_v4(),
      mode,
      turn_index: 0,
      open_threads: Vec::new(),
      deferred_threads: Vec::new(),
      pending_care_actions: BTreeSet::new(),
      status: SessionStatus::Active,
      themes: ThemeTracker::new(),
      started_at: Utc::now(),
    }
  }

  pub fn is_thread_open(&self, label: &str) -> bool {
    self.open_threads.iter().any(|t| t.matches(label))
  }

  /// Append a thread unless one with the same label is already open.
  /// Returns whether it was added.
  pub fn open_thread(&mut self, label: &str, turn: u32) -> bool {
    if self.is_thread_open(label) {
      return false;
    }
    self.deferred_threads.retain(|t| !t.matches(label));
    self.open_threads.push(OpenThread::new(label, turn));
    true
  }

  /// Remove an open thread. Returns it when it was open.
  pub fn close_thread(&mut self, label: &str) -> Option<OpenThread> {
    let idx = self.open_threads.iter().position(|t| t.matches(label))?;
    Some(self.open_threads.remove(idx))
  }

  /// Move an open thread to the deferred list.
  pub fn defer_thread(&mut self, label: &str) -> bool {
    match self.close_thread(label) {
      Some(mut thread) => {
        thread.idle_turns = 0;
        self.deferred_threads.push(thread);
        true
      }
      None => false,
    }
  }

  /// Labels still unresolved: open threads first, then deferred ones.
  pub fn unresolved_labels(&self) -> Vec<String> {
    self
      .open_threads
      .iter()
      .chain(self.deferred_threads.iter())
      .map(|t| t.label.clone())
      .collect()
  }
}

// ─── Summaries and history ───────────────────────────────────────────────────

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
  IntervieweeRequested,
  TurnLimit,
  ScriptComplete,
  /// Closed by the operator before the planner concluded.
  OperatorClosed,
}

/// What survives of a session once it closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
  pub session_id:         Uuid,
  pub mode:               InterviewMode,
  pub started_at:         DateTime<Utc>,
  pub closed_at:          DateTime<Utc>,
  pub turn_count:         u32,
  pub themes:             Vec<Theme>,
  /// The active relationship fact at close, if any was known.
  pub relationship:       Option<RelationshipFact>,
  pub unresolved_threads: Vec<String>,
  pub conclusion:         Conclusion,
}

impl SessionSummary {
  pub fn mentions(&self, label: &str) -> bool {
    let key = label_key(label);
    self.themes.iter().any(|t| t.key() == key)
  }
}

/// Append-only, ordered record of past sessions for one pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
  summaries: Vec<SessionSummary>,
}

impl SessionHistory {
  pub fn new() -> Self { Self::default() }

  pub fn from_summaries(summaries: Vec<SessionSummary>) -> Self {
    Self { summaries }
  }

  pub fn push(&mut self, summary: SessionSummary) { self.summaries.push(summary); }

  pub fn summaries(&self) -> &[SessionSummary] { &self.summaries }

  pub fn len(&self) -> usize { self.summaries.len() }

  pub fn is_empty(&self) -> bool { self.summaries.is_empty() }

  pub fn is_first_session(&self) -> bool { self.summaries.is_empty() }

  pub fn last(&self) -> Option<&SessionSummary> { self.summaries.last() }

  /// The most recent relationship fact recorded at a session close.
  pub fn last_relationship(&self) -> Option<&RelationshipFact> {
    self.summaries.iter().rev().find_map(|s| s.relationship.as_ref())
  }

  /// Themes across every session merged by label: mention counts summed,
  /// highest sensitivity kept, first sighting kept.
  pub fn aggregate_themes(&self) -> Vec<Theme> {
    let mut merged: Vec<Theme> = Vec::new();
    for theme in self.summaries.iter().flat_map(|s| s.themes.iter()) {
      match merged.iter_mut().find(|t| t.key() == theme.key()) {
        Some(existing) => {
          existing.mention_count += theme.mention_count;
          existing.sensitivity = existing.sensitivity.max(theme.sensitivity);
          if existing.representative_quote.is_none() {
            existing.representative_quote = theme.representative_quote.clone();
          }
        }
        None => merged.push(theme.clone()),
      }
    }
    merged
  }

  /// Whether any past session in one of `modes` surfaced `label`.
  pub fn addressed_in(&self, label: &str, modes: &[InterviewMode]) -> bool {
    self
      .summaries
      .iter()
      .filter(|s| modes.contains(&s.mode))
      .any(|s| s.mentions(label))
  }

  /// Number of distinct sensitive themes across history.
  pub fn sensitive_theme_count(&self) -> usize {
    self
      .aggregate_themes()
      .iter()
      .filter(|t| t.sensitivity == Sensitivity::Sensitive)
      .count()
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
