//! Configuration supplied by the operator when a session is created.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  mode::InterviewMode,
  person::{ArchiveKey, Interviewee, Subject},
};

/// Who the interview is about, who is being interviewed, and optionally how
/// to run it. Every field defaults so partial sources can be layered; use
/// [`InterviewConfig::validate`] before starting a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
  pub subject_name:          String,
  pub subject_aliases:       Vec<String>,
  pub interviewee_name:      String,
  pub declared_relationship: Option<String>,
  /// Mode name; omitted to let history decide.
  pub requested_mode:        Option<String>,
  /// Overrides the name-derived archive key.
  pub pair_id:               Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl InterviewConfig {
  pub fn new(subject_name: impl Into<String>, interviewee_name: impl Into<String>) -> Self {
    Self {
      subject_name: subject_name.into(),
      interviewee_name: interviewee_name.into(),
      ..Self::default()
    }
  }

  /// Check required names and the requested mode. Performs no I/O.
  pub fn validate(&self) -> Result<()> {
    if self.subject_name.trim().is_empty() {
      return Err(Error::MissingField("subject_name"));
    }
    if self.interviewee_name.trim().is_empty() {
      return Err(Error::MissingField("interviewee_name"));
    }
    if let Some(mode) = self.requested_mode() {
      InterviewMode::parse(mode)?;
    }
    Ok(())
  }

  pub fn requested_mode(&self) -> Option<&str> { non_blank(&self.requested_mode) }

  pub fn declared_relationship(&self) -> Option<&str> {
    non_blank(&self.declared_relationship)
  }

  pub fn subject(&self) -> Subject {
    Subject::new(self.subject_name.trim()).with_aliases(
      self
        .subject_aliases
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
        .collect(),
    )
  }

  pub fn interviewee(&self) -> Interviewee {
    let interviewee = Interviewee::new(self.interviewee_name.trim());
    match self.declared_relationship() {
      Some(label) => interviewee.with_relationship(label),
      None => interviewee,
    }
  }

  pub fn archive_key(&self) -> ArchiveKey {
    match non_blank(&self.pair_id) {
      Some(id) => ArchiveKey::from_pair_id(id),
      None => ArchiveKey::for_pair(&self.subject(), &self.interviewee()),
    }
  }
}

/// Tunables for the turn planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
  /// Per-mode cap on interviewee turns; unset modes use their default.
  pub max_turns: BTreeMap<InterviewMode, u32>,
}

impl PlannerSettings {
  pub fn max_turns_for(&self, mode: InterviewMode) -> u32 {
    self
      .max_turns
      .get(&mode)
      .copied()
      .filter(|n| *n > 0)
      .unwrap_or_else(|| mode.default_max_turns())
  }

  pub fn with_max_turns(mut self, mode: InterviewMode, turns: u32) -> Self {
    self.max_turns.insert(mode, turns);
    self
  }
}
