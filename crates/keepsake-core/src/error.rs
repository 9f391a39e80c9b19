//! Error types for `keepsake-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// An explicitly requested interview mode is not one of the known modes.
  #[error("unrecognized interview mode: {0:?}")]
  UnrecognizedMode(String),

  #[error("missing required configuration field: {0}")]
  MissingField(&'static str),

  /// The session summary could not be appended, even after retrying.
  #[error("session archive unavailable after {attempts} attempt(s): {reason}")]
  ArchiveUnavailable { attempts: u32, reason: String },

  /// The generation capability failed to render a directive. The turn is
  /// left uncommitted.
  #[error("generation failed: {0}")]
  Generation(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Configuration errors abort session creation and are surfaced to the
  /// operator unchanged.
  pub fn is_configuration(&self) -> bool {
    matches!(self, Self::UnrecognizedMode(_) | Self::MissingField(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
