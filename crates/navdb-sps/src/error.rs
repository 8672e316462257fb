//! Error type for `navdb-sps`.
//!
//! A decode error condemns one record, never a whole run: the importer
//! counts the record as skipped and moves on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A field the engine cannot proceed without was blank or unparsable and
  /// no default was configured.
  #[error("required field {0} is blank or unparsable")]
  MissingField(&'static str),

  /// Composite key encoding failed (arithmetic overflow).
  #[error(transparent)]
  Key(#[from] navdb_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
