//! Structured features of one interviewee utterance.
//!
//! Produced by the external utterance preprocessor. Every field defaults, so
//! a missing or partial payload degrades to "no signal" instead of failing.

use serde::{Deserialize, Serialize};

use crate::{
  relationship::RelationshipSignal,
  theme::{Sensitivity, ThemeFeatures},
};

/// How strongly distress was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distress {
  Mild,
  High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionSignals {
  #[serde(default)]
  pub distress: Option<Distress>,
  #[serde(default)]
  pub tears:    bool,
}

impl EmotionSignals {
  pub fn indicates_distress(&self) -> bool { self.tears || self.distress.is_some() }

  pub fn is_high(&self) -> bool { self.distress == Some(Distress::High) }
}

/// Something the interviewee asked for outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum ExplicitRequest {
  /// Leave the current topic for now.
  Skip,
  Pause,
  Resume,
  /// End the session.
  Stop,
  /// Go back to a topic raised or skipped earlier.
  ReturnTo { label: String },
  /// The interviewee considers a topic finished.
  CloseThread { label: String },
}

/// Outcome of the external answer analysis for the current probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
  Complete,
  Partial,
  NotAddressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerAssessment {
  pub status:           AnswerStatus,
  #[serde(default)]
  pub follow_up_needed: bool,
}

// ─── UtteranceFeatures ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtteranceFeatures {
  pub emotion_signals:               EmotionSignals,
  pub candidate_theme_labels:        Vec<String>,
  pub sensitivity_hint:              Option<Sensitivity>,
  pub quote:                         Option<String>,
  pub candidate_relationship_signal: Option<RelationshipSignal>,
  pub explicit_request:              Option<ExplicitRequest>,
  pub answer:                        Option<AnswerAssessment>,
}

impl UtteranceFeatures {
  /// An utterance that carried nothing usable.
  pub fn empty() -> Self { Self::default() }

  pub fn theme_features(&self) -> ThemeFeatures {
    ThemeFeatures {
      labels:      self.candidate_theme_labels.clone(),
      sensitivity: self.sensitivity_hint,
      quote:       self.quote.clone(),
    }
  }

  pub fn has_signal(&self) -> bool {
    self.emotion_signals.indicates_distress()
      || self.candidate_theme_labels.iter().any(|l| !l.trim().is_empty())
      || self.candidate_relationship_signal.is_some()
      || self.explicit_request.is_some()
      || self.answer.is_some()
  }

  pub fn with_themes(mut self, labels: &[&str]) -> Self {
    self.candidate_theme_labels = labels.iter().map(|l| l.to_string()).collect();
    self
  }

  pub fn with_distress(mut self, distress: Distress) -> Self {
    self.emotion_signals.distress = Some(distress);
    self
  }

  pub fn with_relationship(mut self, signal: RelationshipSignal) -> Self {
    self.candidate_relationship_signal = Some(signal);
    self
  }

  pub fn with_request(mut self, request: ExplicitRequest) -> Self {
    self.explicit_request = Some(request);
    self
  }

  pub fn with_answer(mut self, status: AnswerStatus, follow_up_needed: bool) -> Self {
    self.answer = Some(AnswerAssessment { status, follow_up_needed });
    self
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_json_object_is_no_signal() {
    let features: UtteranceFeatures = serde_json::from_str("{}").unwrap();
    assert_eq!(features, UtteranceFeatures::empty());
    assert!(!features.has_signal());
  }

  #[test]
  fn full_payload_deserialises() {
    let json = r#"{
      "emotion_signals": { "distress": "high" },
      "candidate_theme_labels": ["the funeral"],
      "sensitivity_hint": "sensitive",
      "candidate_relationship_signal": { "kind": "dialogue", "label": "daughter" },
      "explicit_request": { "request": "return_to", "label": "the farm" },
      "answer": { "status": "partial", "follow_up_needed": true }
    }"#;
    let features: UtteranceFeatures = serde_json::from_str(json).unwrap();
    assert!(features.emotion_signals.is_high());
    assert_eq!(features.sensitivity_hint, Some(Sensitivity::Sensitive));
    assert_eq!(
      features.candidate_relationship_signal,
      Some(RelationshipSignal::Dialogue { label: "daughter".into() })
    );
    assert_eq!(
      features.explicit_request,
      Some(ExplicitRequest::ReturnTo { label: "the farm".into() })
    );
    assert!(features.answer.unwrap().follow_up_needed);
  }

  #[test]
  fn tears_alone_count_as_distress() {
    let features = UtteranceFeatures {
      emotion_signals: EmotionSignals { distress: None, tears: true },
      ..Default::default()
    };
    assert!(features.emotion_signals.indicates_distress());
    assert!(!features.emotion_signals.is_high());
  }
}
