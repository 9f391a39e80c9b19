//! The `SessionArchive` trait and an in-memory implementation.
//!
//! The trait is implemented by storage backends (e.g. `keepsake-store-sqlite`).
//! Histories are append-only: a summary, once appended, is never updated or
//! removed, and appending the same session twice stores it once.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{Mutex, PoisonError},
};

use crate::{
  person::ArchiveKey,
  session::{SessionHistory, SessionSummary},
};

/// Persists session summaries per (subject, interviewee) pair.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SessionArchive: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every summary recorded for `key`, oldest first. An unknown pair has an
  /// empty history.
  fn load<'a>(
    &'a self,
    key: &'a ArchiveKey,
  ) -> impl Future<Output = Result<SessionHistory, Self::Error>> + Send + 'a;

  /// Append one closed session. Appending a `session_id` that is already
  /// recorded is a no-op.
  fn append<'a>(
    &'a self,
    key: &'a ArchiveKey,
    summary: &'a SessionSummary,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// Process-local archive, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryArchive {
  histories: Mutex<HashMap<ArchiveKey, SessionHistory>>,
}

impl MemoryArchive {
  pub fn new() -> Self { Self::default() }
}

impl SessionArchive for MemoryArchive {
  type Error = Infallible;

  fn load<'a>(
    &'a self,
    key: &'a ArchiveKey,
  ) -> impl Future<Output = Result<SessionHistory, Self::Error>> + Send + 'a {
    async move {
      let histories = self.histories.lock().unwrap_or_else(PoisonError::into_inner);
      Ok(histories.get(key).cloned().unwrap_or_default())
    }
  }

  fn append<'a>(
    &'a self,
    key: &'a ArchiveKey,
    summary: &'a SessionSummary,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a {
    async move {
      let mut histories =
        self.histories.lock().unwrap_or_else(PoisonError::into_inner);
      let history = histories.entry(key.clone()).or_default();
      if !history
        .summaries()
        .iter()
        .any(|s| s.session_id == summary.session_id)
      {
        history.push(summary.clone());
      }
      Ok(())
    }
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
