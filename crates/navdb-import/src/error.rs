//! Error type for `navdb-import`.

use thiserror::Error;

use crate::ImportSummary;

/// Terminal result of a failed import run.
///
/// Decode failures never appear here — a record that cannot be decoded is
/// counted in `records_skipped` and the run continues. Configuration
/// problems abort before any record is read; store failures abort the
/// in-flight flush and carry the counts of what earlier flushes already
/// committed, so a retry can be scoped correctly.
#[derive(Debug, Error)]
pub enum ImportError<E: std::error::Error> {
  #[error("invalid import configuration: {0}")]
  Config(#[from] navdb_core::Error),

  #[error(
    "store error after {} records committed: {source}",
    partial.records_imported
  )]
  Store {
    source:  E,
    /// What the run had durably committed before the failure.
    partial: ImportSummary,
  },
}
