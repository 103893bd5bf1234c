//! Error types shared by the daily workflow, the dispatch loop and the scheduler.
//!
//! Each layer owns its own error enum (`StoreError`, `TelegramError`, `CatalogError`);
//! `BotError` wraps them and carries the name of the failing step.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::store::StoreError;
use crate::telegram::TelegramError;

#[derive(Debug, Error)]
pub enum BotError {
  #[error("store: {0}")]
  Store(#[from] StoreError),

  #[error("telegram: {0}")]
  Telegram(#[from] TelegramError),

  #[error("catalog: {0}")]
  Catalog(#[from] CatalogError),

  #[error("sticker pool is empty")]
  NoStickers,

  #[error("unknown stream {0:?}")]
  UnknownStream(String),

  #[error("scheduler: {0}")]
  Scheduler(String),

  #[error("{context}: {source}")]
  Context {
    context: String,
    #[source]
    source: Box<BotError>,
  },
}

impl BotError {
  /// Innermost error, skipping the context layers.
  pub fn root(&self) -> &BotError {
    match self {
      BotError::Context { source, .. } => source.root(),
      other => other,
    }
  }
}

/// Attach the name of the failing step to an error, `"publish: send daily: ..."` style.
pub trait ResultExt<T> {
  fn context(self, context: impl Into<String>) -> Result<T, BotError>;
}

impl<T, E: Into<BotError>> ResultExt<T> for Result<T, E> {
  fn context(self, context: impl Into<String>) -> Result<T, BotError> {
    self.map_err(|e| BotError::Context {
      context: context.into(),
      source: Box::new(e.into()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn context_chain_renders_outer_to_inner() {
    let res: Result<(), StoreError> = Err(StoreError::Snapshot {
      path: "state.json".into(),
      source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
    });
    let err = res.context("commit").context("publish").unwrap_err();
    assert_eq!(err.to_string(), "publish: commit: store: snapshot state.json: disk full");
    assert!(matches!(err.root(), BotError::Store(StoreError::Snapshot { .. })));
  }
}
