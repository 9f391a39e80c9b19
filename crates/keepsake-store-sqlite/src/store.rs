//! [`SqliteArchive`]: the SQLite implementation of [`SessionArchive`].

use std::{future::Future, path::Path};

use chrono::Utc;
use rusqlite::TransactionBehavior;
use tracing::debug;

use keepsake_core::{
  archive::SessionArchive,
  person::ArchiveKey,
  session::{SessionHistory, SessionSummary},
};

use crate::{
  Error, Result,
  encode::{RawSummary, SummaryRow, encode_dt},
  schema::SCHEMA,
};

// ─── Archive ─────────────────────────────────────────────────────────────────

/// A session archive backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteArchive {
  conn: tokio_rusqlite::Connection,
}

impl SqliteArchive {
  /// Open (or create) an archive at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let archive = Self { conn };
    archive.init_schema().await?;
    Ok(archive)
  }

  /// Open an in-memory archive, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let archive = Self { conn };
    archive.init_schema().await?;
    Ok(archive)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every summary recorded for `key`, in append order.
  pub async fn load_history(&self, key: &ArchiveKey) -> Result<SessionHistory> {
    let subject = key.subject.clone();
    let interviewee = key.interviewee.clone();

    let raws: Vec<RawSummary> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT session_id, mode, started_at, closed_at, turn_count, themes,
                  relationship, unresolved_threads, conclusion
           FROM session_summaries
           WHERE subject_key = ?1 AND interviewee_key = ?2
           ORDER BY seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject, interviewee], |row| {
            Ok(RawSummary {
              session_id:         row.get(0)?,
              mode:               row.get(1)?,
              started_at:         row.get(2)?,
              closed_at:          row.get(3)?,
              turn_count:         row.get(4)?,
              themes:             row.get(5)?,
              relationship:       row.get(6)?,
              unresolved_threads: row.get(7)?,
              conclusion:         row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let summaries = raws
      .into_iter()
      .map(RawSummary::into_summary)
      .collect::<Result<Vec<_>>>()?;
    Ok(SessionHistory::from_summaries(summaries))
  }

  /// Append a summary at the end of the pair's history. Returns `false` when
  /// the session was already recorded and nothing was written.
  pub async fn append_summary(
    &self,
    key: &ArchiveKey,
    summary: &SessionSummary,
  ) -> Result<bool> {
    let row = SummaryRow::encode(summary)?;
    let subject = key.subject.clone();
    let interviewee = key.interviewee.clone();
    let recorded_at = encode_dt(Utc::now());

    let (inserted, seq) = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so the sequence number
        // cannot be raced by another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seq: i64 = tx.query_row(
          "SELECT COALESCE(MAX(seq) + 1, 0) FROM session_summaries
           WHERE subject_key = ?1 AND interviewee_key = ?2",
          rusqlite::params![subject, interviewee],
          |r| r.get(0),
        )?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO session_summaries
             (session_id, subject_key, interviewee_key, seq, mode, started_at,
              closed_at, turn_count, themes, relationship, unresolved_threads,
              conclusion, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            row.session_id,
            subject,
            interviewee,
            seq,
            row.mode,
            row.started_at,
            row.closed_at,
            row.turn_count,
            row.themes,
            row.relationship,
            row.unresolved_threads,
            row.conclusion,
            recorded_at,
          ],
        )?;
        tx.commit()?;
        Ok((inserted > 0, seq))
      })
      .await?;

    if inserted {
      debug!(pair = %key, session_id = %summary.session_id, seq, "summary appended");
    } else {
      debug!(pair = %key, session_id = %summary.session_id, "summary already recorded");
    }
    Ok(inserted)
  }

  /// Every pair with at least one recorded session.
  pub async fn pairs(&self) -> Result<Vec<ArchiveKey>> {
    let rows: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT subject_key, interviewee_key FROM session_summaries
           ORDER BY subject_key, interviewee_key",
        )?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(subject, interviewee)| ArchiveKey { subject, interviewee })
        .collect(),
    )
  }
}

// ─── SessionArchive impl ─────────────────────────────────────────────────────

impl SessionArchive for SqliteArchive {
  type Error = Error;

  fn load<'a>(
    &'a self,
    key: &'a ArchiveKey,
  ) -> impl Future<Output = Result<SessionHistory>> + Send + 'a {
    self.load_history(key)
  }

  fn append<'a>(
    &'a self,
    key: &'a ArchiveKey,
    summary: &'a SessionSummary,
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    async move {
      self.append_summary(key, summary).await?;
      Ok(())
    }
  }
}
