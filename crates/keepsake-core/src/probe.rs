//! Scripted probes: the planned questions of each interview mode.
//!
//! A probe names what a question is after, never how it is worded. Probes
//! are asked lowest priority first, and each may earn at most one follow-up
//! when the answer comes back partial.

use serde::{Deserialize, Serialize};

use crate::{
  features::{AnswerAssessment, AnswerStatus},
  mode::InterviewMode,
};

/// Follow-ups allowed per probe before a partial answer counts as complete.
pub const MAX_FOLLOW_UPS: u32 = 1;

/// Id of the probe that opens every script.
pub const RELATIONSHIP_PROBE: &str = "relationship";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Probe {
  pub id:       &'static str,
  pub priority: u8,
  /// What the question should draw out, for the generation capability.
  pub intent:   &'static str,
}

const fn probe(id: &'static str, priority: u8, intent: &'static str) -> Probe {
  Probe { id, priority, intent }
}

/// The shared opener of every script.
pub const OPENER: Probe =
  probe(RELATIONSHIP_PROBE, 0, "how the interviewee knew and related to the subject");

const GENERAL: &[Probe] = &[
  probe("origins", 1, "where and when the subject was born and raised"),
  probe("character_story", 1, "a specific story that shows who the subject was"),
  probe("work_life", 2, "what the subject loved about their work"),
  probe("important_people", 2, "the people who mattered most to the subject"),
  probe("passions", 3, "hobbies, favourite places and small pleasures"),
  probe("hardship", 3, "a difficult time and how the subject met it"),
  probe("values", 4, "what mattered most to the subject"),
  probe("remembrance", 5, "how the subject would want to be remembered"),
];

const DEEP_DIVE: &[Probe] = &[
  probe("revisit_story", 1, "return to a story told before and go further into it"),
  probe("sensory_detail", 2, "the subject's voice, mannerisms and surroundings"),
  probe("remembered_words", 2, "things the subject actually said"),
  probe("turning_point", 3, "a moment that changed the course of the subject's life"),
  probe("other_perspectives", 4, "how others saw the same events"),
];

const FAMILY_DYNAMICS: &[Probe] = &[
  probe("household", 1, "the household the subject built and ran"),
  probe("partnership", 2, "the subject's marriage or life partnership"),
  probe("parenting", 2, "the subject as a parent or caregiver"),
  probe("siblings", 3, "the subject's brothers and sisters"),
  probe("traditions", 3, "family rituals, holidays and recipes"),
  probe("tensions", 4, "disagreements in the family, from the interviewee's view"),
  probe("reconciliation", 4, "how the family came back together"),
];

const LEGACY: &[Probe] = &[
  probe("values", 1, "the principles the subject lived by"),
  probe("advice", 2, "advice the subject gave or would give"),
  probe("proudest", 2, "what the subject was proudest of"),
  probe("influence", 3, "how the subject shaped the interviewee"),
  probe("unfinished", 4, "hopes the subject did not get to fulfil"),
  probe("remembrance", 5, "what should never be forgotten about the subject"),
];

const CHILDHOOD: &[Probe] = &[
  probe("birthplace", 1, "where the subject was born and the world they were born into"),
  probe("parents", 1, "the subject's own parents"),
  probe("childhood_home", 2, "the home the subject grew up in"),
  probe("schooling", 2, "the subject's school years"),
  probe("early_friends", 3, "friends and games of the subject's youth"),
  probe("formative_event", 3, "an event that shaped the subject young"),
  probe("leaving_home", 4, "when and how the subject left home"),
];

/// The fixed probe list for `mode`, without the shared opener.
pub fn probes_for(mode: InterviewMode) -> &'static [Probe] {
  match mode {
    InterviewMode::General => GENERAL,
    InterviewMode::DeepDive => DEEP_DIVE,
    InterviewMode::FamilyDynamics => FAMILY_DYNAMICS,
    InterviewMode::Legacy => LEGACY,
    InterviewMode::Childhood => CHILDHOOD,
  }
}

// ─── Script progress ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
  #[default]
  NotStarted,
  /// Asked, no assessment yet.
  Asked,
  /// Answered in part; one follow-up is owed.
  Partial,
  Complete,
  Skipped,
}

#[derive(Debug, Clone)]
struct Entry {
  probe:      Probe,
  status:     ProbeStatus,
  follow_ups: u32,
}

/// Tracks the probes of one session's mode.
#[derive(Debug, Clone)]
pub struct ProbeScript {
  entries: Vec<Entry>,
}

impl ProbeScript {
  pub fn for_mode(mode: InterviewMode) -> Self {
    let entries = std::iter::once(OPENER)
      .chain(probes_for(mode).iter().copied())
      .map(|probe| Entry { probe, status: ProbeStatus::NotStarted, follow_ups: 0 })
      .collect();
    Self { entries }
  }

  fn entry_mut(&mut self, id: &str) -> Option<&mut Entry> {
    self.entries.iter_mut().find(|e| e.probe.id == id)
  }

  pub fn status(&self, id: &str) -> Option<ProbeStatus> {
    self.entries.iter().find(|e| e.probe.id == id).map(|e| e.status)
  }

  /// The probe to ask next and whether it is a follow-up. An owed follow-up
  /// comes first; otherwise the lowest-priority unstarted probe, in script
  /// order.
  pub fn next(&self) -> Option<(Probe, bool)> {
    if let Some(e) = self.entries.iter().find(|e| e.status == ProbeStatus::Partial) {
      return Some((e.probe, true));
    }
    self
      .entries
      .iter()
      .filter(|e| e.status == ProbeStatus::NotStarted)
      .min_by_key(|e| e.probe.priority)
      .map(|e| (e.probe, false))
  }

  pub fn is_exhausted(&self) -> bool { self.next().is_none() }

  pub fn mark_asked(&mut self, id: &str) {
    if let Some(e) = self.entry_mut(id) {
      e.status = ProbeStatus::Asked;
    }
  }

  pub fn mark_complete(&mut self, id: &str) {
    if let Some(e) = self.entry_mut(id) {
      e.status = ProbeStatus::Complete;
    }
  }

  pub fn skip(&mut self, id: &str) {
    if let Some(e) = self.entry_mut(id) {
      e.status = ProbeStatus::Skipped;
    }
  }

  /// Apply the external answer analysis to a probe that was asked.
  pub fn record_answer(&mut self, id: &str, answer: AnswerAssessment) {
    let Some(e) = self.entry_mut(id) else {
      return;
    };
    e.status = match answer.status {
      AnswerStatus::Complete => ProbeStatus::Complete,
      AnswerStatus::Partial if answer.follow_up_needed && e.follow_ups < MAX_FOLLOW_UPS => {
        e.follow_ups += 1;
        ProbeStatus::Partial
      }
      AnswerStatus::Partial => ProbeStatus::Complete,
      AnswerStatus::NotAddressed => ProbeStatus::NotStarted,
    };
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn partial(follow_up_needed: bool) -> AnswerAssessment {
    AnswerAssessment { status: AnswerStatus::Partial, follow_up_needed }
  }

  #[test]
  fn every_script_opens_with_relationship() {
    for mode in crate::mode::all_modes() {
      let script = ProbeScript::for_mode(mode);
      assert_eq!(script.next().unwrap().0.id, RELATIONSHIP_PROBE);
    }
  }

  #[test]
  fn lowest_priority_first_then_script_order() {
    let mut script = ProbeScript::for_mode(InterviewMode::General);
    script.mark_complete(RELATIONSHIP_PROBE);
    assert_eq!(script.next().unwrap().0.id, "origins");
    script.mark_asked("origins");
    assert_eq!(script.next().unwrap().0.id, "character_story");
  }

  #[test]
  fn partial_answer_earns_one_follow_up() {
    let mut script = ProbeScript::for_mode(InterviewMode::Legacy);
    script.mark_complete(RELATIONSHIP_PROBE);
    script.mark_asked("values");
    script.record_answer("values", partial(true));

    let (probe, follow_up) = script.next().unwrap();
    assert_eq!(probe.id, "values");
    assert!(follow_up);

    script.mark_asked("values");
    script.record_answer("values", partial(true));
    assert_eq!(script.status("values"), Some(ProbeStatus::Complete));
    assert_eq!(script.next().unwrap().0.id, "advice");
  }

  #[test]
  fn unaddressed_probe_returns_to_pool() {
    let mut script = ProbeScript::for_mode(InterviewMode::Childhood);
    script.mark_asked(RELATIONSHIP_PROBE);
    script.record_answer(RELATIONSHIP_PROBE, AnswerAssessment {
      status:           AnswerStatus::NotAddressed,
      follow_up_needed: false,
    });
    assert_eq!(script.next().unwrap().0.id, RELATIONSHIP_PROBE);
  }

  #[test]
  fn script_exhausts() {
    let mut script = ProbeScript::for_mode(InterviewMode::DeepDive);
    while let Some((probe, _)) = script.next() {
      script.skip(probe.id);
    }
    assert!(script.is_exhausted());
  }
}
