//! Relationship model: what is known about how the interviewee relates to
//! the subject.
//!
//! At most one [`RelationshipFact`] is active per pair. Facts are replaced,
//! never edited, and confidence only moves upward within a session except
//! when a weak inference is contradicted by a later turn.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label used when the only evidence is a shared family name.
pub const UNKNOWN_FAMILY_MEMBER: &str = "unknown_family_member";

/// Label of the placeholder fact reported before anything is known.
pub const UNKNOWN_LABEL: &str = "unknown";

// ─── Provenance ──────────────────────────────────────────────────────────────

/// How a relationship fact came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
  Declared,
  InferredSameSurname,
  InferredFromDialogue,
  Unknown,
}

/// Ordered certainty: `None < Weak < Strong`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
  #[default]
  None,
  Weak,
  Strong,
}

/// The relationship between interviewee and subject as currently believed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipFact {
  pub kind:        RelationshipKind,
  /// The interviewee's relation to the subject, e.g. "daughter".
  pub label:       String,
  pub confidence:  Confidence,
  /// Turn index of the utterance (or 0 for configuration) that produced it.
  pub source_turn: u32,
}

impl RelationshipFact {
  /// Placeholder reported while nothing is known.
  pub fn unknown() -> Self {
    Self {
      kind:        RelationshipKind::Unknown,
      label:       UNKNOWN_LABEL.to_owned(),
      confidence:  Confidence::None,
      source_turn: 0,
    }
  }

  pub fn is_strong(&self) -> bool { self.confidence == Confidence::Strong }
}

/// Evidence about the relationship, as delivered by configuration or by the
/// utterance preprocessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipSignal {
  /// Supplied by the operator; always authoritative.
  Declared { label: String },
  /// Both names end in the same token.
  SharedSurname,
  /// The interviewee described themself relative to the subject in
  /// conversation ("Dad was..." from a daughter yields `daughter`).
  Dialogue { label: String },
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// Mention turn recorded for evidence carried over from an earlier session.
/// Never reached by a live session's turn counter.
const PRIOR_SESSION_TURN: u32 = u32::MAX;

/// Holds the single active fact plus the dialogue evidence needed for the
/// corroboration rule.
#[derive(Debug, Clone, Default)]
pub struct RelationshipModel {
  active:   Option<RelationshipFact>,
  /// Distinct turns in which each normalised dialogue label was mentioned.
  mentions: HashMap<String, BTreeSet<u32>>,
}

impl RelationshipModel {
  pub fn new() -> Self { Self::default() }

  /// Carry a fact over from a previous session. A dialogue inference counts
  /// as one mention, so a single confirmation in this session corroborates it.
  pub fn seed(&mut self, fact: RelationshipFact) {
    if fact.kind == RelationshipKind::Unknown {
      return;
    }
    if fact.kind == RelationshipKind::InferredFromDialogue
      && let Some(label) = normalise_label(&fact.label)
    {
      self.mentions.entry(label).or_default().insert(PRIOR_SESSION_TURN);
    }
    debug!(label = %fact.label, confidence = ?fact.confidence, "seeded relationship");
    self.active = Some(fact);
  }

  /// The active fact, or the `unknown` placeholder.
  pub fn current(&self) -> RelationshipFact {
    self.active.clone().unwrap_or_else(RelationshipFact::unknown)
  }

  pub fn active(&self) -> Option<&RelationshipFact> { self.active.as_ref() }

  pub fn confidence(&self) -> Confidence {
    self.active.as_ref().map_or(Confidence::None, |f| f.confidence)
  }

  /// Apply one signal observed at `turn`. Returns the new active fact when
  /// the signal changed it, `None` when it was ignored.
  pub fn observe(
    &mut self,
    signal: &RelationshipSignal,
    turn: u32,
  ) -> Option<RelationshipFact> {
    let candidate = match signal {
      RelationshipSignal::Declared { label } => {
        let label = normalise_label(label)?;
        RelationshipFact {
          kind: RelationshipKind::Declared,
          label,
          confidence: Confidence::Strong,
          source_turn: turn,
        }
      }
      RelationshipSignal::SharedSurname => {
        if self.active.is_some() {
          return None;
        }
        RelationshipFact {
          kind:        RelationshipKind::InferredSameSurname,
          label:       UNKNOWN_FAMILY_MEMBER.to_owned(),
          confidence:  Confidence::Weak,
          source_turn: turn,
        }
      }
      RelationshipSignal::Dialogue { label } => {
        let label = normalise_label(label)?;
        let turns = self.mentions.entry(label.clone()).or_default();
        turns.insert(turn);
        let confidence = if turns.len() >= 2 {
          Confidence::Strong
        } else {
          Confidence::Weak
        };
        RelationshipFact {
          kind: RelationshipKind::InferredFromDialogue,
          label,
          confidence,
          source_turn: turn,
        }
      }
    };

    if !self.supersedes(&candidate) {
      return None;
    }

    debug!(
      kind = ?candidate.kind,
      label = %candidate.label,
      confidence = ?candidate.confidence,
      turn,
      "relationship fact replaced"
    );
    self.active = Some(candidate.clone());
    Some(candidate)
  }

  /// Whether `candidate` may replace the active fact.
  fn supersedes(&self, candidate: &RelationshipFact) -> bool {
    let Some(active) = &self.active else {
      return true;
    };

    if candidate.kind == RelationshipKind::Declared {
      return active != candidate;
    }
    if active.kind == RelationshipKind::Declared {
      return false;
    }

    match (active.confidence, candidate.confidence) {
      // A corroborated inference replaces anything below a declaration.
      (_, Confidence::Strong) => {
        active.label != candidate.label || active.confidence != Confidence::Strong
      }
      (Confidence::Strong, _) => false,
      // A weak inference contradicted by a different label gives way.
      _ => active.label != candidate.label,
    }
  }
}

fn normalise_label(label: &str) -> Option<String> {
  let folded = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
  (!folded.is_empty()).then_some(folded)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn dialogue(label: &str) -> RelationshipSignal {
    RelationshipSignal::Dialogue { label: label.into() }
  }

  fn declared(label: &str) -> RelationshipSignal {
    RelationshipSignal::Declared { label: label.into() }
  }

  #[test]
  fn starts_unknown() {
    let model = RelationshipModel::new();
    let fact = model.current();
    assert_eq!(fact.kind, RelationshipKind::Unknown);
    assert_eq!(fact.confidence, Confidence::None);
  }

  #[test]
  fn declared_is_strong() {
    let mut model = RelationshipModel::new();
    let fact = model.observe(&declared("Daughter"), 0).unwrap();
    assert_eq!(fact.kind, RelationshipKind::Declared);
    assert_eq!(fact.label, "daughter");
    assert_eq!(fact.confidence, Confidence::Strong);
  }

  #[test]
  fn shared_surname_is_weak_unknown_family_member() {
    let mut model = RelationshipModel::new();
    let fact = model.observe(&RelationshipSignal::SharedSurname, 0).unwrap();
    assert_eq!(fact.kind, RelationshipKind::InferredSameSurname);
    assert_eq!(fact.label, UNKNOWN_FAMILY_MEMBER);
    assert_eq!(fact.confidence, Confidence::Weak);
  }

  #[test]
  fn shared_surname_ignored_once_declared() {
    let mut model = RelationshipModel::new();
    model.observe(&declared("son"), 0);
    assert!(model.observe(&RelationshipSignal::SharedSurname, 0).is_none());
    assert_eq!(model.current().label, "son");
  }

  #[test]
  fn dialogue_needs_two_distinct_turns_to_corroborate() {
    let mut model = RelationshipModel::new();

    let first = model.observe(&dialogue("daughter"), 1).unwrap();
    assert_eq!(first.confidence, Confidence::Weak);

    // Same turn again: no corroboration.
    assert!(model.observe(&dialogue("daughter"), 1).is_none());
    assert_eq!(model.confidence(), Confidence::Weak);

    let second = model.observe(&dialogue("Daughter"), 3).unwrap();
    assert_eq!(second.confidence, Confidence::Strong);
    assert_eq!(second.source_turn, 3);
  }

  #[test]
  fn seeded_weak_inference_is_corroborated_by_one_mention() {
    let mut model = RelationshipModel::new();
    model.seed(RelationshipFact {
      kind:        RelationshipKind::InferredFromDialogue,
      label:       "daughter".into(),
      confidence:  Confidence::Weak,
      source_turn: 6,
    });
    assert_eq!(model.confidence(), Confidence::Weak);

    let fact = model.observe(&dialogue("Daughter"), 1).unwrap();
    assert_eq!(fact.confidence, Confidence::Strong);
    assert_eq!(fact.source_turn, 1);
  }

  #[test]
  fn seeded_surname_inference_is_not_dialogue_evidence() {
    let mut model = RelationshipModel::new();
    model.seed(RelationshipFact {
      kind:        RelationshipKind::InferredSameSurname,
      label:       UNKNOWN_FAMILY_MEMBER.into(),
      confidence:  Confidence::Weak,
      source_turn: 0,
    });
    let fact = model.observe(&dialogue("son"), 1).unwrap();
    assert_eq!(fact.label, "son");
    assert_eq!(fact.confidence, Confidence::Weak);
  }

  #[test]
  fn weak_inference_is_revised_by_contradiction() {
    let mut model = RelationshipModel::new();
    model.observe(&RelationshipSignal::SharedSurname, 0);
    let fact = model.observe(&dialogue("niece"), 1).unwrap();
    assert_eq!(fact.label, "niece");
    assert_eq!(fact.confidence, Confidence::Weak);

    let fact = model.observe(&dialogue("granddaughter"), 2).unwrap();
    assert_eq!(fact.label, "granddaughter");
    assert_eq!(fact.confidence, Confidence::Weak);
  }

  #[test]
  fn strong_inference_survives_a_weak_contradiction() {
    let mut model = RelationshipModel::new();
    model.observe(&dialogue("son"), 1);
    model.observe(&dialogue("son"), 2);
    assert!(model.observe(&dialogue("nephew"), 3).is_none());
    assert_eq!(model.current().label, "son");
    assert_eq!(model.confidence(), Confidence::Strong);

    // Corroborating the contradiction does replace it.
    let fact = model.observe(&dialogue("nephew"), 4).unwrap();
    assert_eq!(fact.label, "nephew");
    assert!(fact.is_strong());
  }

  #[test]
  fn declared_never_overridden_by_dialogue() {
    let mut model = RelationshipModel::new();
    model.observe(&declared("wife"), 0);
    assert!(model.observe(&dialogue("sister"), 1).is_none());
    assert!(model.observe(&dialogue("sister"), 2).is_none());
    let fact = model.current();
    assert_eq!(fact.kind, RelationshipKind::Declared);
    assert_eq!(fact.label, "wife");
  }

  #[test]
  fn newer_declaration_supersedes_older() {
    let mut model = RelationshipModel::new();
    model.observe(&declared("friend"), 0);
    let fact = model.observe(&declared("partner"), 4).unwrap();
    assert_eq!(fact.label, "partner");
  }

  #[test]
  fn confidence_never_decreases_without_contradiction() {
    let mut model = RelationshipModel::new();
    let signals = [
      dialogue("daughter"),
      RelationshipSignal::SharedSurname,
      dialogue("daughter"),
      RelationshipSignal::SharedSurname,
      dialogue("daughter"),
    ];
    let mut last = Confidence::None;
    for (turn, signal) in signals.iter().enumerate() {
      model.observe(signal, turn as u32 + 1);
      assert!(model.confidence() >= last);
      last = model.confidence();
    }
    assert_eq!(last, Confidence::Strong);
  }

  #[test]
  fn blank_labels_are_ignored() {
    let mut model = RelationshipModel::new();
    assert!(model.observe(&dialogue("   "), 1).is_none());
    assert!(model.observe(&declared(""), 0).is_none());
    assert!(model.active().is_none());
  }

  #[test]
  fn seed_keeps_previous_session_fact() {
    let mut model = RelationshipModel::new();
    model.seed(RelationshipFact {
      kind:        RelationshipKind::InferredFromDialogue,
      label:       "daughter".into(),
      confidence:  Confidence::Strong,
      source_turn: 7,
    });
    assert!(model.current().is_strong());
    assert!(model.observe(&RelationshipSignal::SharedSurname, 0).is_none());
  }
}
