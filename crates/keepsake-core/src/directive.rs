//! Directives: the planner's structured instructions to the generation
//! capability.
//!
//! A directive says what kind of utterance to produce and under which
//! constraints. It never carries wording.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  mode::InterviewMode,
  probe::Probe,
  relationship::{Confidence, RelationshipFact, RelationshipKind},
  session::CareAction,
  theme::Sensitivity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
  Question,
  Care,
  Closing,
}

/// Selects the prompt template, together with the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveCategory {
  RelationshipOpener,
  ReturningOpener,
  RequestedReturn,
  OpenThread,
  ScriptedProbe,
  Care,
  ClosingSummary,
}

/// Interviewing guidance for the generator, independent of wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhrasingConstraint {
  Gentle,
  NoPressure,
  AcknowledgeFeelings,
  OfferPause,
  RespectBoundary,
  SpecificStory,
  SensoryDetail,
  UseSubjectName,
  ReflectBack,
  ExpressAppreciation,
  LeaveDoorOpen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRef {
  pub id:        String,
  pub intent:    String,
  /// Re-asking a probe whose answer came back partial.
  pub follow_up: bool,
}

impl ProbeRef {
  pub fn new(probe: &Probe, follow_up: bool) -> Self {
    Self {
      id: probe.id.to_owned(),
      intent: probe.intent.to_owned(),
      follow_up,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipContext {
  pub label:      String,
  pub kind:       RelationshipKind,
  pub confidence: Confidence,
}

impl From<&RelationshipFact> for RelationshipContext {
  fn from(fact: &RelationshipFact) -> Self {
    Self {
      label:      fact.label.clone(),
      kind:       fact.kind,
      confidence: fact.confidence,
    }
  }
}

// ─── Directive ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
  pub kind:                 DirectiveKind,
  pub category:             DirectiveCategory,
  pub mode:                 InterviewMode,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub focus_theme:          Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub probe:                Option<ProbeRef>,
  pub relationship_context: RelationshipContext,
  pub phrasing_constraints: Vec<PhrasingConstraint>,
  #[serde(default)]
  pub care_actions:         Vec<CareAction>,
  pub turn_index:           u32,
}

impl Directive {
  pub fn new(
    category: DirectiveCategory,
    mode: InterviewMode,
    relationship: &RelationshipFact,
    turn_index: u32,
  ) -> Self {
    let kind = match category {
      DirectiveCategory::Care => DirectiveKind::Care,
      DirectiveCategory::ClosingSummary => DirectiveKind::Closing,
      _ => DirectiveKind::Question,
    };
    Self {
      kind,
      category,
      mode,
      focus_theme: None,
      probe: None,
      relationship_context: relationship.into(),
      phrasing_constraints: Vec::new(),
      care_actions: Vec::new(),
      turn_index,
    }
  }

  pub fn with_focus(mut self, theme: Option<String>) -> Self {
    self.focus_theme = theme;
    self
  }

  pub fn with_probe(mut self, probe: &Probe, follow_up: bool) -> Self {
    self.probe = Some(ProbeRef::new(probe, follow_up));
    self
  }

  pub fn with_care_actions(
    mut self,
    actions: impl IntoIterator<Item = CareAction>,
  ) -> Self {
    self.care_actions = actions.into_iter().collect();
    self
  }

  /// Derive the phrasing constraints from the category, the mode, the care
  /// actions carried and the sensitivity of the focus theme.
  pub fn constrained(mut self, focus_sensitivity: Sensitivity) -> Self {
    use PhrasingConstraint::*;

    let mut out: Vec<PhrasingConstraint> = match self.category {
      DirectiveCategory::RelationshipOpener => vec![Gentle, NoPressure, UseSubjectName],
      DirectiveCategory::ReturningOpener => vec![Gentle, ReflectBack, UseSubjectName],
      DirectiveCategory::RequestedReturn => vec![ReflectBack, SpecificStory],
      DirectiveCategory::OpenThread => vec![SpecificStory, ReflectBack],
      DirectiveCategory::ScriptedProbe => vec![SpecificStory],
      DirectiveCategory::Care => vec![Gentle, AcknowledgeFeelings, NoPressure],
      DirectiveCategory::ClosingSummary => {
        vec![ExpressAppreciation, ReflectBack, LeaveDoorOpen, UseSubjectName]
      }
    };

    if self.mode == InterviewMode::DeepDive && self.kind == DirectiveKind::Question {
      out.push(SensoryDetail);
    }
    if self.probe.as_ref().is_some_and(|p| p.follow_up) {
      out.push(ReflectBack);
    }
    if focus_sensitivity >= Sensitivity::Tender {
      out.extend([Gentle, NoPressure]);
    }
    if focus_sensitivity == Sensitivity::Sensitive {
      out.push(RespectBoundary);
    }
    for action in &self.care_actions {
      match action {
        CareAction::OfferBreak => out.push(OfferPause),
        CareAction::AcknowledgeEmotion => out.push(AcknowledgeFeelings),
        CareAction::DeferTopic => out.push(RespectBoundary),
      }
    }

    let mut seen = Vec::with_capacity(out.len());
    for c in out {
      if !seen.contains(&c) {
        seen.push(c);
      }
    }
    self.phrasing_constraints = seen;
    self
  }

  pub fn has_constraint(&self, constraint: PhrasingConstraint) -> bool {
    self.phrasing_constraints.contains(&constraint)
  }

  pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string(self)?) }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
