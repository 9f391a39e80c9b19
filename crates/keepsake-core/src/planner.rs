//! The turn planner: a per-utterance state machine that decides what kind of
//! utterance the interviewer produces next.
//!
//! Each interviewee utterance is processed in a fixed order: relationship,
//! explicit requests, turn limit, emotion, themes, answer. Emotional care
//! always pre-empts topic work. Processing is committed as soon as a turn is
//! planned; the bookkeeping that depends on what was actually said (probe
//! asked, thread explored, care delivered, session closed) is committed only
//! when the rendered text is accepted through [`PendingTurn::accept`].

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  directive::{Directive, DirectiveCategory},
  features::{ExplicitRequest, UtteranceFeatures},
  mode::InterviewMode,
  probe::{OPENER, Probe, ProbeScript, RELATIONSHIP_PROBE},
  relationship::{Confidence, RelationshipModel},
  session::{
    CareAction, Conclusion, SessionHistory, SessionState, SessionStatus,
    SessionSummary,
  },
  theme::{Sensitivity, label_key},
};

/// Consecutive turns without overlap after which an open thread is resolved.
pub const THREAD_IDLE_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
  /// Relationship confidence is below strong.
  AwaitingRelationship,
  Established,
  /// Care is owed; the phase to return to is held aside.
  CareHold,
  Concluding,
  Concluded,
}

/// What accepting an emitted directive commits.
#[derive(Debug, Clone)]
enum Commit {
  Ask {
    probe:  Option<&'static str>,
    thread: Option<String>,
    /// Put the thread (back) into the open list.
    reopen: bool,
  },
  Care,
  Closing,
}

// ─── Planner ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TurnPlanner {
  state:            SessionState,
  relationship:     RelationshipModel,
  script:           ProbeScript,
  phase:            TurnPhase,
  held_phase:       TurnPhase,
  max_turns:        u32,
  conclusion:       Option<Conclusion>,
  pause_requested:  bool,
  opened:           bool,
  /// Probe asked by the last accepted question, awaiting assessment.
  current_probe:    Option<&'static str>,
  /// Thread asked about by the last accepted question.
  focus_thread:     Option<String>,
  /// Label keys of threads already asked about.
  explored_threads: HashSet<String>,
  returning:        bool,
  returning_focus:  Option<String>,
}

impl TurnPlanner {
  pub fn new(
    mode: InterviewMode,
    relationship: RelationshipModel,
    max_turns: u32,
  ) -> Self {
    let mut planner = Self {
      state: SessionState::new(mode),
      relationship,
      script: ProbeScript::for_mode(mode),
      phase: TurnPhase::AwaitingRelationship,
      held_phase: TurnPhase::AwaitingRelationship,
      max_turns: max_turns.max(1),
      conclusion: None,
      pause_requested: false,
      opened: false,
      current_probe: None,
      focus_thread: None,
      explored_threads: HashSet::new(),
      returning: false,
      returning_focus: None,
    };
    planner.sync_relationship();
    planner
  }

  /// Mark this session as a return visit, picking up the first thread the
  /// previous session left unresolved.
  pub fn returning_from(mut self, history: &SessionHistory) -> Self {
    if let Some(last) = history.last() {
      self.returning = true;
      self.returning_focus = last.unresolved_threads.first().cloned();
    }
    self
  }

  pub fn phase(&self) -> TurnPhase { self.phase }

  pub fn state(&self) -> &SessionState { &self.state }

  pub fn relationship(&self) -> &RelationshipModel { &self.relationship }

  pub fn script(&self) -> &ProbeScript { &self.script }

  pub fn mode(&self) -> InterviewMode { self.state.mode }

  pub fn max_turns(&self) -> u32 { self.max_turns }

  pub fn conclusion(&self) -> Option<Conclusion> { self.conclusion }

  pub fn is_concluded(&self) -> bool { self.phase == TurnPhase::Concluded }

  pub fn is_paused(&self) -> bool { self.state.status == SessionStatus::Paused }

  /// The opening directive at turn 0. `None` once the session has opened or
  /// any utterance has been planned.
  pub fn open(&mut self) -> Option<PendingTurn<'_>> {
    if self.opened || self.state.turn_index > 0 || self.is_concluded() {
      return None;
    }

    if self.relationship.confidence() < Confidence::Strong {
      let directive = self.directive(
        DirectiveCategory::RelationshipOpener,
        None,
        Some((OPENER, false)),
      );
      return Some(self.pending(directive, Commit::Ask {
        probe:  Some(RELATIONSHIP_PROBE),
        thread: None,
        reopen: false,
      }));
    }

    if self.returning {
      let focus = self.returning_focus.clone();
      let directive =
        self.directive(DirectiveCategory::ReturningOpener, focus.clone(), None);
      return Some(self.pending(directive, Commit::Ask {
        probe:  None,
        thread: focus,
        reopen: true,
      }));
    }

    match self.script.next() {
      Some((probe, follow_up)) => Some(self.ask_probe(probe, follow_up)),
      None => {
        self.conclusion = Some(Conclusion::ScriptComplete);
        Some(self.closing())
      }
    }
  }

  /// Process one interviewee utterance and plan the reply.
  ///
  /// Returns `None` when the session has concluded, is paused, or has just
  /// been paused by this utterance.
  pub fn plan_turn(
    &mut self,
    features: &UtteranceFeatures,
  ) -> Option<PendingTurn<'_>> {
    if self.is_concluded() {
      return None;
    }
    let request = features.explicit_request.as_ref();
    if self.is_paused() {
      if request != Some(&ExplicitRequest::Resume) {
        debug!(turn = self.state.turn_index, "session paused, utterance ignored");
        return None;
      }
      self.state.status = SessionStatus::Active;
      debug!(turn = self.state.turn_index, "session resumed");
    }

    self.state.turn_index += 1;
    let turn = self.state.turn_index;
    if !features.has_signal() {
      debug!(turn, "utterance carried no signal");
    }

    if let Some(signal) = &features.candidate_relationship_signal {
      self.relationship.observe(signal, turn);
    }
    self.sync_relationship();

    let return_to = request.and_then(|r| self.apply_request(r));

    if self.conclusion.is_none() && turn >= self.max_turns {
      debug!(turn, max_turns = self.max_turns, "turn limit reached");
      self.conclusion = Some(Conclusion::TurnLimit);
    }

    let emotion = features.emotion_signals;
    if emotion.indicates_distress() {
      self.state.pending_care_actions.insert(CareAction::AcknowledgeEmotion);
      if emotion.is_high() {
        self.state.pending_care_actions.insert(CareAction::OfferBreak);
      }
      self.enter_care_hold();
    }

    self.theme_pass(features, turn);

    if let Some(answer) = features.answer
      && let Some(id) = self.current_probe.take()
    {
      self.script.record_answer(id, answer);
      debug!(probe = id, status = ?self.script.status(id), "answer recorded");
    }
    self.sync_relationship();

    self.emit(return_to)
  }

  /// Build the summary archived when the session closes.
  pub fn summary(&self) -> SessionSummary {
    SessionSummary {
      session_id:         self.state.session_id,
      mode:               self.state.mode,
      started_at:         self.state.started_at,
      closed_at:          Utc::now(),
      turn_count:         self.state.turn_index,
      themes:             self.state.themes.themes().to_vec(),
      relationship:       self.relationship.active().cloned(),
      unresolved_threads: self.state.unresolved_labels(),
      conclusion:         self.conclusion.unwrap_or(Conclusion::OperatorClosed),
    }
  }

  // ── Passes ────────────────────────────────────────────────────────────

  /// Move to `established` once the relationship is strong, and retire the
  /// relationship probe.
  fn sync_relationship(&mut self) {
    if self.relationship.confidence() < Confidence::Strong {
      return;
    }
    let slot = if self.phase == TurnPhase::CareHold {
      &mut self.held_phase
    } else {
      &mut self.phase
    };
    if *slot == TurnPhase::AwaitingRelationship {
      *slot = TurnPhase::Established;
      debug!(label = %self.relationship.current().label, "relationship established");
    }
    self.script.mark_complete(RELATIONSHIP_PROBE);
  }

  /// Returns the label of an explicit return request.
  fn apply_request(&mut self, request: &ExplicitRequest) -> Option<String> {
    match request {
      ExplicitRequest::Stop => {
        if self.conclusion.is_none() {
          self.conclusion = Some(Conclusion::IntervieweeRequested);
        }
        debug!("interviewee asked to stop");
      }
      ExplicitRequest::Pause => self.pause_requested = true,
      ExplicitRequest::Resume => {}
      ExplicitRequest::Skip => {
        self.state.pending_care_actions.insert(CareAction::DeferTopic);
        if let Some(label) = self.focus_thread.take()
          && self.state.defer_thread(&label)
        {
          debug!(thread = %label, "thread deferred");
        } else if let Some(id) = self.current_probe.take() {
          self.script.skip(id);
          debug!(probe = id, "probe skipped");
        }
      }
      ExplicitRequest::CloseThread { label } => {
        self.state.close_thread(label);
        self.state.deferred_threads.retain(|t| !t.matches(label));
        if self.focus_thread.as_deref().is_some_and(|f| label_key(f) == label_key(label)) {
          self.focus_thread = None;
        }
        debug!(thread = %label, "thread closed by interviewee");
      }
      ExplicitRequest::ReturnTo { label } => {
        let label = label.trim();
        if !label.is_empty() {
          return Some(label.to_owned());
        }
      }
    }
    None
  }

  fn enter_care_hold(&mut self) {
    if self.phase != TurnPhase::CareHold {
      self.held_phase = self.phase;
      self.phase = TurnPhase::CareHold;
      debug!(held = ?self.held_phase, "entering care hold");
    }
  }

  fn theme_pass(&mut self, features: &UtteranceFeatures, turn: u32) {
    let delta = self.state.themes.ingest(&features.theme_features(), turn);
    if self.phase == TurnPhase::CareHold {
      return;
    }

    let touched: HashSet<String> = delta.touched().cloned().collect();
    let mut resolved = Vec::new();
    self.state.open_threads.retain_mut(|thread| {
      if touched.contains(&label_key(&thread.label)) {
        thread.idle_turns = 0;
        return true;
      }
      thread.idle_turns += 1;
      if thread.idle_turns >= THREAD_IDLE_LIMIT {
        resolved.push(thread.label.clone());
        return false;
      }
      true
    });
    for label in resolved {
      debug!(thread = %label, turn, "thread resolved");
      if self.focus_thread.as_deref() == Some(label.as_str()) {
        self.focus_thread = None;
      }
    }

    for key in delta.created.iter().chain(delta.escalated.iter()) {
      let Some(label) = self.state.themes.get(key).map(|t| t.label.clone()) else {
        continue;
      };
      if self.state.deferred_threads.iter().any(|t| t.matches(&label)) {
        continue;
      }
      if self.state.open_thread(&label, turn) {
        self.explored_threads.remove(key);
        debug!(thread = %label, turn, "thread opened");
      }
    }
  }

  // ── Emission ──────────────────────────────────────────────────────────

  fn emit(&mut self, return_to: Option<String>) -> Option<PendingTurn<'_>> {
    if self.phase == TurnPhase::CareHold {
      let directive = self.directive(DirectiveCategory::Care, None, None);
      return Some(self.pending(directive, Commit::Care));
    }
    if self.conclusion.is_some() {
      return Some(self.closing());
    }
    if self.pause_requested {
      self.pause_requested = false;
      self.state.status = SessionStatus::Paused;
      debug!(turn = self.state.turn_index, "session paused");
      return None;
    }

    if let Some(label) = return_to {
      let label = self.state.themes.get(&label).map_or(label, |t| t.label.clone());
      let directive = self.directive(
        DirectiveCategory::RequestedReturn,
        Some(label.clone()),
        None,
      );
      return Some(self.pending(directive, Commit::Ask {
        probe:  None,
        thread: Some(label),
        reopen: true,
      }));
    }

    let unexplored = self
      .state
      .open_threads
      .iter()
      .find(|t| !self.explored_threads.contains(&label_key(&t.label)))
      .map(|t| t.label.clone());
    if let Some(label) = unexplored {
      let directive =
        self.directive(DirectiveCategory::OpenThread, Some(label.clone()), None);
      return Some(self.pending(directive, Commit::Ask {
        probe:  None,
        thread: Some(label),
        reopen: false,
      }));
    }

    if let Some((probe, follow_up)) = self.script.next() {
      return Some(self.ask_probe(probe, follow_up));
    }

    debug!(turn = self.state.turn_index, "script exhausted with no open threads");
    self.conclusion = Some(Conclusion::ScriptComplete);
    Some(self.closing())
  }

  fn ask_probe(&mut self, probe: Probe, follow_up: bool) -> PendingTurn<'_> {
    let directive = self.directive(
      DirectiveCategory::ScriptedProbe,
      None,
      Some((probe, follow_up)),
    );
    self.pending(directive, Commit::Ask {
      probe:  Some(probe.id),
      thread: None,
      reopen: false,
    })
  }

  fn closing(&mut self) -> PendingTurn<'_> {
    if self.phase != TurnPhase::Concluding {
      debug!(conclusion = ?self.conclusion, "concluding session");
      self.phase = TurnPhase::Concluding;
    }
    let focus = self.state.themes.most_mentioned().map(|t| t.label.clone());
    let directive = self.directive(DirectiveCategory::ClosingSummary, focus, None);
    self.pending(directive, Commit::Closing)
  }

  fn directive(
    &self,
    category: DirectiveCategory,
    focus: Option<String>,
    probe: Option<(Probe, bool)>,
  ) -> Directive {
    let sensitivity = focus
      .as_deref()
      .and_then(|label| self.state.themes.get(label))
      .map_or(Sensitivity::None, |t| t.sensitivity);

    let mut directive = Directive::new(
      category,
      self.state.mode,
      &self.relationship.current(),
      self.state.turn_index,
    )
    .with_focus(focus)
    .with_care_actions(self.state.pending_care_actions.iter().copied());
    if let Some((probe, follow_up)) = probe {
      directive = directive.with_probe(&probe, follow_up);
    }
    directive.constrained(sensitivity)
  }

  fn pending(&mut self, directive: Directive, commit: Commit) -> PendingTurn<'_> {
    PendingTurn { planner: self, directive, commit }
  }
}

// ─── Pending turn ────────────────────────────────────────────────────────────

/// A planned directive awaiting rendering. Holds the planner until accepted;
/// dropping it leaves the emission uncommitted.
#[derive(Debug)]
pub struct PendingTurn<'a> {
  planner:   &'a mut TurnPlanner,
  directive: Directive,
  commit:    Commit,
}

impl PendingTurn<'_> {
  pub fn directive(&self) -> &Directive { &self.directive }

  /// Commit the emission once the generator has rendered it.
  pub fn accept(self, rendered: &str) -> Directive {
    let PendingTurn { planner, directive, commit } = self;
    if rendered.trim().is_empty() {
      warn!(turn = directive.turn_index, "generator rendered an empty utterance");
    }

    planner.opened = true;
    planner.state.pending_care_actions.clear();

    match commit {
      Commit::Care => {
        planner.phase = planner.held_phase;
        debug!(phase = ?planner.phase, "care delivered");
        if planner.pause_requested && planner.conclusion.is_none() {
          planner.pause_requested = false;
          planner.state.status = SessionStatus::Paused;
          debug!(turn = directive.turn_index, "session paused");
        }
      }
      Commit::Closing => {
        planner.phase = TurnPhase::Concluded;
        planner.state.status = SessionStatus::Concluded;
        debug!(turn = directive.turn_index, "session concluded");
      }
      Commit::Ask { probe, thread, reopen } => {
        if let Some(id) = probe {
          planner.script.mark_asked(id);
        }
        if let Some(label) = &thread {
          if reopen {
            planner.state.open_thread(label, directive.turn_index);
          }
          planner.explored_threads.insert(label_key(label));
        }
        planner.current_probe = probe;
        planner.focus_thread = thread;
      }
    }

    directive
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
