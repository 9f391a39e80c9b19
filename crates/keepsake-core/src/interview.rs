//! One interview session from start to close: history load, mode selection,
//! per-turn rendering through a [`Generator`], and archiving the summary.

use std::future::Future;

use tracing::{error, info, warn};

use crate::{
  Error, Result,
  archive::SessionArchive,
  config::{InterviewConfig, PlannerSettings},
  directive::Directive,
  features::UtteranceFeatures,
  mode,
  person::{ArchiveKey, shares_surname},
  planner::{PendingTurn, TurnPlanner},
  relationship::{RelationshipModel, RelationshipSignal},
  session::{SessionHistory, SessionSummary},
};

/// Append attempts made when a session closes.
pub const APPEND_ATTEMPTS: u32 = 2;

/// Renders a directive into interviewer text. Opaque to the engine.
pub trait Generator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn render<'a>(
    &'a self,
    directive: &'a Directive,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}

/// A directive together with the text it was rendered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewerTurn {
  pub directive: Directive,
  pub text:      String,
}

#[derive(Debug)]
pub struct Interview {
  key:              ArchiveKey,
  history:          SessionHistory,
  planner:          TurnPlanner,
  archive_degraded: bool,
}

impl Interview {
  /// Validate `config`, load the pair's history and set up the planner.
  ///
  /// Configuration errors are returned before the archive is touched. A
  /// failing archive is not fatal: the session runs without history.
  pub async fn start<A: SessionArchive>(
    config: &InterviewConfig,
    settings: &PlannerSettings,
    archive: &A,
  ) -> Result<Self> {
    config.validate()?;
    let key = config.archive_key();

    let (history, archive_degraded) = match archive.load(&key).await {
      Ok(history) => (history, false),
      Err(e) => {
        warn!(pair = %key, error = %e, "session archive unavailable, starting without history");
        (SessionHistory::new(), true)
      }
    };

    let mode = mode::select(config.requested_mode(), &history)?;

    let mut relationship = RelationshipModel::new();
    if let Some(fact) = history.last_relationship() {
      relationship.seed(fact.clone());
    }
    if let Some(label) = config.declared_relationship() {
      relationship.observe(&RelationshipSignal::Declared { label: label.to_owned() }, 0);
    }
    if shares_surname(&config.subject(), &config.interviewee()) {
      relationship.observe(&RelationshipSignal::SharedSurname, 0);
    }

    let planner = TurnPlanner::new(mode, relationship, settings.max_turns_for(mode))
      .returning_from(&history);

    info!(
      pair = %key,
      session_id = %planner.state().session_id,
      %mode,
      prior_sessions = history.len(),
      sensitive_themes = history.sensitive_theme_count(),
      relationship = %planner.relationship().current().label,
      "interview started"
    );

    Ok(Self { key, history, planner, archive_degraded })
  }

  pub fn key(&self) -> &ArchiveKey { &self.key }

  /// History as loaded at start; empty when the archive was unavailable.
  pub fn history(&self) -> &SessionHistory { &self.history }

  pub fn planner(&self) -> &TurnPlanner { &self.planner }

  pub fn is_archive_degraded(&self) -> bool { self.archive_degraded }

  pub fn is_concluded(&self) -> bool { self.planner.is_concluded() }

  /// Render the opening turn.
  pub async fn open<G: Generator>(
    &mut self,
    generator: &G,
  ) -> Result<Option<InterviewerTurn>> {
    let mut staged = self.planner.clone();
    let turn = deliver(staged.open(), generator).await?;
    self.planner = staged;
    Ok(turn)
  }

  /// Feed one interviewee utterance and render the reply, if any.
  ///
  /// The utterance is planned on a copy of the planner that replaces it only
  /// once rendering succeeds. After [`Error::Generation`] nothing has been
  /// applied, and the same features can be fed again.
  pub async fn respond<G: Generator>(
    &mut self,
    features: &UtteranceFeatures,
    generator: &G,
  ) -> Result<Option<InterviewerTurn>> {
    let mut staged = self.planner.clone();
    let turn = deliver(staged.plan_turn(features), generator).await?;
    self.planner = staged;
    Ok(turn)
  }

  /// Archive the session summary. Allowed in any phase; the append is
  /// retried once before giving up.
  pub async fn close<A: SessionArchive>(&self, archive: &A) -> Result<SessionSummary> {
    let summary = self.planner.summary();
    let mut reason = String::new();

    for attempt in 1..=APPEND_ATTEMPTS {
      match archive.append(&self.key, &summary).await {
        Ok(()) => {
          info!(
            pair = %self.key,
            session_id = %summary.session_id,
            turns = summary.turn_count,
            themes = summary.themes.len(),
            conclusion = ?summary.conclusion,
            "session archived"
          );
          return Ok(summary);
        }
        Err(e) => {
          warn!(pair = %self.key, attempt, error = %e, "session append failed");
          reason = e.to_string();
        }
      }
    }

    error!(
      pair = %self.key,
      session_id = %summary.session_id,
      attempts = APPEND_ATTEMPTS,
      "session summary could not be archived"
    );
    Err(Error::ArchiveUnavailable { attempts: APPEND_ATTEMPTS, reason })
  }
}

async fn deliver<G: Generator>(
  pending: Option<PendingTurn<'_>>,
  generator: &G,
) -> Result<Option<InterviewerTurn>> {
  let Some(pending) = pending else {
    return Ok(None);
  };
  let text = generator
    .render(pending.directive())
    .await
    .map_err(|e| Error::Generation(Box::new(e)))?;
  let directive = pending.accept(&text);
  Ok(Some(InterviewerTurn { directive, text }))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use chrono::Utc;
  use uuid::Uuid;

  use super::*;
  use crate::{
    archive::MemoryArchive,
    directive::{DirectiveCategory, DirectiveKind},
    features::Distress,
    mode::InterviewMode,
    relationship::{Confidence, RelationshipKind},
    session::Conclusion,
    theme::{Sensitivity, Theme},
  };

  struct Echo;

  #[derive(Debug, thiserror::Error)]
  #[error("generator offline")]
  struct Offline;

  impl Generator for Echo {
    type Error = Offline;

    fn render<'a>(
      &'a self,
      directive: &'a Directive,
    ) -> impl Future<Output = Result<String, Offline>> + Send + 'a {
      async move { Ok(format!("{:?}", directive.category)) }
    }
  }

  struct Broken;

  impl Generator for Broken {
    type Error = Offline;

    fn render<'a>(
      &'a self,
      _: &'a Directive,
    ) -> impl Future<Output = Result<String, Offline>> + Send + 'a {
      async { Err(Offline) }
    }
  }

  /// Fails the first `load_failures` loads and `append_failures` appends.
  #[derive(Default)]
  struct Flaky {
    inner:           MemoryArchive,
    load_failures:   AtomicU32,
    append_failures: AtomicU32,
    loads:           AtomicU32,
    appends:         AtomicU32,
  }

  impl Flaky {
    fn failing(loads: u32, appends: u32) -> Self {
      Self {
        load_failures: AtomicU32::new(loads),
        append_failures: AtomicU32::new(appends),
        ..Self::default()
      }
    }
  }

  fn fail_once(counter: &AtomicU32) -> bool {
    counter
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }

  impl SessionArchive for Flaky {
    type Error = Offline;

    fn load<'a>(
      &'a self,
      key: &'a ArchiveKey,
    ) -> impl Future<Output = Result<SessionHistory, Offline>> + Send + 'a {
      async move {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if fail_once(&self.load_failures) {
          return Err(Offline);
        }
        Ok(self.inner.load(key).await.unwrap_or_default())
      }
    }

    fn append<'a>(
      &'a self,
      key: &'a ArchiveKey,
      summary: &'a SessionSummary,
    ) -> impl Future<Output = Result<(), Offline>> + Send + 'a {
      async move {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if fail_once(&self.append_failures) {
          return Err(Offline);
        }
        let _ = self.inner.append(key, summary).await;
        Ok(())
      }
    }
  }

  fn chen() -> InterviewConfig { InterviewConfig::new("Robert Chen", "Sarah Chen") }

  fn daughter() -> UtteranceFeatures {
    UtteranceFeatures::empty()
      .with_relationship(RelationshipSignal::Dialogue { label: "daughter".into() })
  }

  #[tokio::test]
  async fn unrecognized_mode_fails_before_any_io() {
    let archive = Flaky::default();
    let mut config = chen();
    config.requested_mode = Some("nostalgia".into());

    let err = Interview::start(&config, &PlannerSettings::default(), &archive)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::UnrecognizedMode(ref m) if m == "nostalgia"));
    assert!(err.is_configuration());
    assert_eq!(archive.loads.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn sarah_chen_across_two_sessions() {
    let archive = MemoryArchive::new();
    let settings = PlannerSettings::default();

    let mut interview = Interview::start(&chen(), &settings, &archive).await.unwrap();
    assert_eq!(interview.planner().mode(), InterviewMode::General);
    let fact = interview.planner().relationship().current();
    assert_eq!(fact.kind, RelationshipKind::InferredSameSurname);
    assert_eq!(fact.confidence, Confidence::Weak);

    let opener = interview.open(&Echo).await.unwrap().unwrap();
    assert_eq!(opener.directive.category, DirectiveCategory::RelationshipOpener);
    assert_eq!(opener.text, "RelationshipOpener");

    interview.respond(&daughter(), &Echo).await.unwrap();
    assert_eq!(interview.planner().relationship().confidence(), Confidence::Weak);
    interview
      .respond(&daughter().with_themes(&["the restaurant"]), &Echo)
      .await
      .unwrap();
    assert_eq!(interview.planner().relationship().confidence(), Confidence::Strong);

    let summary = interview.close(&archive).await.unwrap();
    assert_eq!(summary.conclusion, Conclusion::OperatorClosed);
    assert_eq!(summary.relationship.as_ref().unwrap().label, "daughter");

    let mut second = Interview::start(&chen(), &settings, &archive).await.unwrap();
    assert_eq!(second.history().len(), 1);
    assert!(second.planner().relationship().current().is_strong());
    let opener = second.open(&Echo).await.unwrap().unwrap();
    assert_eq!(opener.directive.category, DirectiveCategory::ReturningOpener);
    assert_eq!(opener.directive.focus_theme.as_deref(), Some("the restaurant"));
  }

  #[tokio::test]
  async fn requested_mode_overrides_history() {
    let archive = MemoryArchive::new();
    let key = chen().archive_key();
    let now = Utc::now();
    archive
      .append(&key, &SessionSummary {
        session_id:         Uuid::new_v4(),
        mode:               InterviewMode::General,
        started_at:         now,
        closed_at:          now,
        turn_count:         20,
        themes:             vec![Theme {
          label:                "the restaurant".into(),
          first_seen_turn:      2,
          mention_count:        5,
          sensitivity:          Sensitivity::None,
          representative_quote: None,
        }],
        relationship:       None,
        unresolved_threads: vec![],
        conclusion:         Conclusion::TurnLimit,
      })
      .await
      .unwrap();

    let settings = PlannerSettings::default();
    let auto = Interview::start(&chen(), &settings, &archive).await.unwrap();
    assert_eq!(auto.planner().mode(), InterviewMode::DeepDive);

    let mut config = chen();
    config.requested_mode = Some("legacy".into());
    let chosen = Interview::start(&config, &settings, &archive).await.unwrap();
    assert_eq!(chosen.planner().mode(), InterviewMode::Legacy);
    assert_eq!(chosen.planner().max_turns(), 25);
  }

  #[tokio::test]
  async fn declared_relationship_beats_surname() {
    let mut config = chen();
    config.declared_relationship = Some("Granddaughter".into());
    let interview = Interview::start(&config, &PlannerSettings::default(), &MemoryArchive::new())
      .await
      .unwrap();
    let fact = interview.planner().relationship().current();
    assert_eq!(fact.kind, RelationshipKind::Declared);
    assert_eq!(fact.label, "granddaughter");
  }

  #[tokio::test]
  async fn failed_load_degrades_to_empty_history() {
    let archive = Flaky::failing(1, 0);
    let interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    assert!(interview.is_archive_degraded());
    assert!(interview.history().is_first_session());
  }

  #[tokio::test]
  async fn append_is_retried_once() {
    let archive = Flaky::failing(0, 1);
    let interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    interview.close(&archive).await.unwrap();
    assert_eq!(archive.appends.load(Ordering::SeqCst), 2);
    assert_eq!(archive.inner.load(interview.key()).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn append_gives_up_after_two_attempts() {
    let archive = Flaky::failing(0, 5);
    let interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    let err = interview.close(&archive).await.unwrap_err();
    assert!(matches!(err, Error::ArchiveUnavailable { attempts: 2, .. }));
    assert_eq!(archive.appends.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn generation_failure_leaves_turn_uncommitted() {
    let archive = MemoryArchive::new();
    let mut interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    interview.open(&Echo).await.unwrap();

    let upset = UtteranceFeatures::empty().with_distress(Distress::High);
    let err = interview.respond(&upset, &Broken).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
    assert_eq!(interview.planner().state().turn_index, 0);

    let turn = interview.respond(&upset, &Echo).await.unwrap().unwrap();
    assert_eq!(turn.directive.kind, DirectiveKind::Care);
    assert_eq!(turn.directive.turn_index, 1);
  }

  #[tokio::test]
  async fn retried_utterance_is_counted_once() {
    let archive = MemoryArchive::new();
    let config = InterviewConfig::new("Robert Chen", "Sarah Park");
    let mut interview = Interview::start(&config, &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    interview.open(&Echo).await.unwrap();

    let features = daughter().with_themes(&["the restaurant"]);
    let err = interview.respond(&features, &Broken).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
    interview.respond(&features, &Echo).await.unwrap();

    let planner = interview.planner();
    assert_eq!(planner.relationship().confidence(), Confidence::Weak);
    assert_eq!(planner.state().turn_index, 1);
    let theme = planner.state().themes.get("the restaurant").unwrap();
    assert_eq!(theme.mention_count, 1);
  }

  #[tokio::test]
  async fn failed_opening_can_be_rendered_again() {
    let archive = MemoryArchive::new();
    let mut interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    assert!(interview.open(&Broken).await.is_err());
    let opener = interview.open(&Echo).await.unwrap().unwrap();
    assert_eq!(opener.directive.category, DirectiveCategory::RelationshipOpener);
  }

  #[tokio::test]
  async fn stop_then_close_records_request() {
    let archive = MemoryArchive::new();
    let mut interview = Interview::start(&chen(), &PlannerSettings::default(), &archive)
      .await
      .unwrap();
    interview.open(&Echo).await.unwrap();
    let stop = UtteranceFeatures::empty()
      .with_request(crate::features::ExplicitRequest::Stop);
    let turn = interview.respond(&stop, &Echo).await.unwrap().unwrap();
    assert_eq!(turn.directive.kind, DirectiveKind::Closing);
    assert!(interview.is_concluded());
    assert!(interview.respond(&stop, &Echo).await.unwrap().is_none());

    let summary = interview.close(&archive).await.unwrap();
    assert_eq!(summary.conclusion, Conclusion::IntervieweeRequested);
  }
}
