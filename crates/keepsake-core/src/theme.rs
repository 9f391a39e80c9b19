//! Theme tracking: the recurring subject-matter threads of a session.
//!
//! Candidate labels are extracted upstream; this module only merges them.
//! Labels are unique under [`label_key`], and a theme's sensitivity never
//! goes down.

use serde::{Deserialize, Serialize};

/// How carefully a theme has to be approached: `None < Tender < Sensitive`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
  #[default]
  None,
  Tender,
  Sensitive,
}

/// A recurring topic, e.g. "immigration story".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
  /// Label as first seen; comparisons go through [`label_key`].
  pub label:                String,
  pub first_seen_turn:      u32,
  pub mention_count:        u32,
  pub sensitivity:          Sensitivity,
  pub representative_quote: Option<String>,
}

impl Theme {
  pub fn key(&self) -> String { label_key(&self.label) }

  pub fn matches(&self, label: &str) -> bool { self.key() == label_key(label) }
}

/// Comparison key for theme labels: surrounding punctuation stripped, inner
/// whitespace collapsed, lowercased.
pub fn label_key(label: &str) -> String {
  label
    .split_whitespace()
    .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
    .filter(|w| !w.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// The theme-related part of one utterance's features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeFeatures {
  #[serde(default)]
  pub labels:      Vec<String>,
  #[serde(default)]
  pub sensitivity: Option<Sensitivity>,
  #[serde(default)]
  pub quote:       Option<String>,
}

/// What an ingest changed, by theme key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeDelta {
  pub created:   Vec<String>,
  pub updated:   Vec<String>,
  /// Existing themes whose sensitivity went up.
  pub escalated: Vec<String>,
}

impl ThemeDelta {
  pub fn is_empty(&self) -> bool {
    self.created.is_empty() && self.updated.is_empty()
  }

  /// Every key touched by the ingest.
  pub fn touched(&self) -> impl Iterator<Item = &String> {
    self.created.iter().chain(self.updated.iter())
  }
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Accumulates themes for one session, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeTracker {
  themes: Vec<Theme>,
}

impl ThemeTracker {
  pub fn new() -> Self { Self::default() }

  pub fn ingest(&mut self, features: &ThemeFeatures, turn: u32) -> ThemeDelta {
    let mut delta = ThemeDelta::default();
    let hint = features.sensitivity.unwrap_or_default();
    let quote = features
      .quote
      .as_deref()
      .map(str::trim)
      .filter(|q| !q.is_empty());

    for raw in &features.labels {
      let key = label_key(raw);
      if key.is_empty() || delta.touched().any(|k| *k == key) {
        continue;
      }

      match self.themes.iter_mut().find(|t| t.key() == key) {
        Some(theme) => {
          theme.mention_count += 1;
          if hint > theme.sensitivity {
            theme.sensitivity = hint;
            delta.escalated.push(key.clone());
          }
          if theme.representative_quote.is_none() {
            theme.representative_quote = quote.map(str::to_owned);
          }
          delta.updated.push(key);
        }
        None => {
          self.themes.push(Theme {
            label:                raw.trim().to_owned(),
            first_seen_turn:      turn,
            mention_count:        1,
            sensitivity:          hint,
            representative_quote: quote.map(str::to_owned),
          });
          delta.created.push(key);
        }
      }
    }

    delta
  }

  pub fn get(&self, label: &str) -> Option<&Theme> {
    let key = label_key(label);
    self.themes.iter().find(|t| t.key() == key)
  }

  pub fn contains(&self, label: &str) -> bool { self.get(label).is_some() }

  pub fn themes(&self) -> &[Theme] { &self.themes }

  pub fn len(&self) -> usize { self.themes.len() }

  pub fn is_empty(&self) -> bool { self.themes.is_empty() }

  /// The theme mentioned most often; ties go to the earliest seen.
  pub fn most_mentioned(&self) -> Option<&Theme> {
    self
      .themes
      .iter()
      .rev()
      .max_by_key(|t| t.mention_count)
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn labels(ls: &[&str]) -> ThemeFeatures {
    ThemeFeatures {
      labels: ls.iter().map(|s| s.to_string()).collect(),
      ..Default::default()
    }
  }

  #[test]
  fn new_label_creates_theme() {
    let mut tracker = ThemeTracker::new();
    let delta = tracker.ingest(&labels(&["Immigration story"]), 2);
    assert_eq!(delta.created, vec!["immigration story"]);
    let theme = tracker.get("immigration story").unwrap();
    assert_eq!(theme.mention_count, 1);
    assert_eq!(theme.first_seen_turn, 2);
    assert_eq!(theme.label, "Immigration story");
  }

  #[test]
  fn repeated_label_increments_by_one_each_time() {
    let mut tracker = ThemeTracker::new();
    tracker.ingest(&labels(&["the farm"]), 1);
    let delta = tracker.ingest(&labels(&["The Farm"]), 2);
    assert_eq!(delta.updated, vec!["the farm"]);
    assert!(delta.created.is_empty());
    tracker.ingest(&labels(&["  the   farm. "]), 3);

    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.get("THE FARM").unwrap().mention_count, 3);
  }

  #[test]
  fn duplicates_within_one_utterance_count_once() {
    let mut tracker = ThemeTracker::new();
    tracker.ingest(&labels(&["war", "War", "WAR"]), 1);
    assert_eq!(tracker.get("war").unwrap().mention_count, 1);
  }

  #[test]
  fn sensitivity_only_goes_up() {
    let mut tracker = ThemeTracker::new();
    let mut f = labels(&["illness"]);
    f.sensitivity = Some(Sensitivity::Sensitive);
    tracker.ingest(&f, 1);

    f.sensitivity = Some(Sensitivity::Tender);
    let delta = tracker.ingest(&f, 2);
    assert!(delta.escalated.is_empty());
    assert_eq!(tracker.get("illness").unwrap().sensitivity, Sensitivity::Sensitive);

    f.sensitivity = None;
    tracker.ingest(&f, 3);
    assert_eq!(tracker.get("illness").unwrap().sensitivity, Sensitivity::Sensitive);
  }

  #[test]
  fn escalation_is_reported() {
    let mut tracker = ThemeTracker::new();
    tracker.ingest(&labels(&["divorce"]), 1);
    let mut f = labels(&["Divorce"]);
    f.sensitivity = Some(Sensitivity::Tender);
    let delta = tracker.ingest(&f, 2);
    assert_eq!(delta.escalated, vec!["divorce"]);
  }

  #[test]
  fn first_quote_is_kept() {
    let mut tracker = ThemeTracker::new();
    let mut f = labels(&["garden"]);
    f.quote = Some("He talked to his tomatoes.".into());
    tracker.ingest(&f, 1);
    f.quote = Some("Every morning at six.".into());
    tracker.ingest(&f, 2);
    assert_eq!(
      tracker.get("garden").unwrap().representative_quote.as_deref(),
      Some("He talked to his tomatoes.")
    );
  }

  #[test]
  fn blank_labels_are_ignored() {
    let mut tracker = ThemeTracker::new();
    let delta = tracker.ingest(&labels(&["", "   ", "..."]), 1);
    assert!(delta.is_empty());
    assert!(tracker.is_empty());
  }

  #[test]
  fn most_mentioned_prefers_earliest_on_tie() {
    let mut tracker = ThemeTracker::new();
    tracker.ingest(&labels(&["music", "work"]), 1);
    assert_eq!(tracker.most_mentioned().unwrap().label, "music");
    tracker.ingest(&labels(&["work"]), 2);
    assert_eq!(tracker.most_mentioned().unwrap().label, "work");
  }
}
