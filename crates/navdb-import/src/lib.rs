//! Streaming batch importer — the orchestration layer of the engine.
//!
//! One [`Importer`] processes one file (or upload stream) start to finish:
//! decode each record, fold it into the running per-line aggregates, stage
//! it into an in-memory batch, and flush the batch to the store every
//! `batch_size` records. Each flush is its own transaction, so a failure
//! late in a file never rolls back earlier flushes — an explicit
//! at-least-once guarantee, reported through the run summary.
//!
//! The importer holds no connections and no global state; everything it
//! touches comes in through the [`PointStore`](navdb_core::store::PointStore)
//! trait, which is what makes it testable against an in-memory store.

mod error;
mod importer;

pub use error::ImportError;
pub use importer::{
  CancelFlag, DEFAULT_BATCH_SIZE, ImportOptions, ImportSummary, Importer,
};

#[cfg(test)]
mod tests;
