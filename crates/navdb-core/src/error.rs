//! Error types for `navdb-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("geometry mask {0:?} contains characters outside L/P/X/S")]
  InvalidMask(String),

  #[error("geometry mask {mask:?} reserves no {axis} digits")]
  MaskMissingAxis { mask: String, axis: &'static str },

  #[error("geometry mask {0:?} reserves more digits than a 64-bit key holds")]
  MaskTooWide(String),

  #[error("field {field} has invalid offsets {start}..{end}")]
  InvalidSpan {
    field: &'static str,
    start: usize,
    end:   usize,
  },

  #[error("unknown duplicate policy: {0:?}")]
  UnknownPolicy(String),

  #[error("unknown point kind: {0:?}")]
  UnknownPointKind(String),

  #[error("tier must be at least 1, got {0}")]
  InvalidTier(i64),

  #[error("batch size must be greater than zero")]
  ZeroBatchSize,

  #[error("composite key overflow for tier {tier}, line {line}, point {point}")]
  KeyOverflow {
    tier:  i64,
    line:  i64,
    point: i64,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
