//! Encoding and decoding helpers between Keepsake domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings, and
//! structured fields (themes, relationship, unresolved threads) compact JSON.

use chrono::{DateTime, Utc};
use keepsake_core::{
  mode::InterviewMode,
  relationship::RelationshipFact,
  session::{Conclusion, SessionSummary},
  theme::Theme,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Mode and conclusion ─────────────────────────────────────────────────────

pub fn decode_mode(s: &str) -> Result<InterviewMode> { Ok(InterviewMode::parse(s)?) }

pub fn encode_conclusion(c: Conclusion) -> &'static str {
  match c {
    Conclusion::IntervieweeRequested => "interviewee_requested",
    Conclusion::TurnLimit => "turn_limit",
    Conclusion::ScriptComplete => "script_complete",
    Conclusion::OperatorClosed => "operator_closed",
  }
}

pub fn decode_conclusion(s: &str) -> Result<Conclusion> {
  match s {
    "interviewee_requested" => Ok(Conclusion::IntervieweeRequested),
    "turn_limit" => Ok(Conclusion::TurnLimit),
    "script_complete" => Ok(Conclusion::ScriptComplete),
    "operator_closed" => Ok(Conclusion::OperatorClosed),
    other => Err(Error::Decode(format!("unknown conclusion: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values for one `session_summaries` insert, minus the pair key and
/// sequence number which are assigned inside the transaction.
pub struct SummaryRow {
  pub session_id:         String,
  pub mode:               String,
  pub started_at:         String,
  pub closed_at:          String,
  pub turn_count:         i64,
  pub themes:             String,
  pub relationship:       Option<String>,
  pub unresolved_threads: String,
  pub conclusion:         &'static str,
}

impl SummaryRow {
  pub fn encode(summary: &SessionSummary) -> Result<Self> {
    Ok(Self {
      session_id:         encode_uuid(summary.session_id),
      mode:               summary.mode.as_ref().to_owned(),
      started_at:         encode_dt(summary.started_at),
      closed_at:          encode_dt(summary.closed_at),
      turn_count:         i64::from(summary.turn_count),
      themes:             serde_json::to_string(&summary.themes)?,
      relationship:       summary
        .relationship
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?,
      unresolved_threads: serde_json::to_string(&summary.unresolved_threads)?,
      conclusion:         encode_conclusion(summary.conclusion),
    })
  }
}

/// Raw strings read directly from a `session_summaries` row.
pub struct RawSummary {
  pub session_id:         String,
  pub mode:               String,
  pub started_at:         String,
  pub closed_at:          String,
  pub turn_count:         i64,
  pub themes:             String,
  pub relationship:       Option<String>,
  pub unresolved_threads: String,
  pub conclusion:         String,
}

impl RawSummary {
  pub fn into_summary(self) -> Result<SessionSummary> {
    let turn_count = u32::try_from(self.turn_count)
      .map_err(|_| Error::Decode(format!("bad turn count: {}", self.turn_count)))?;
    let themes: Vec<Theme> = serde_json::from_str(&self.themes)?;
    let relationship: Option<RelationshipFact> = self
      .relationship
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(SessionSummary {
      session_id: decode_uuid(&self.session_id)?,
      mode: decode_mode(&self.mode)?,
      started_at: decode_dt(&self.started_at)?,
      closed_at: decode_dt(&self.closed_at)?,
      turn_count,
      themes,
      relationship,
      unresolved_threads: serde_json::from_str(&self.unresolved_threads)?,
      conclusion: decode_conclusion(&self.conclusion)?,
    })
  }
}
