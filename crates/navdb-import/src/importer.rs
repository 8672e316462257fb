//! The import run: decode → index → resolve duplicates → batch → persist.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use serde::Serialize;

use navdb_core::{
  aggregate::LineAggregates,
  geometry::{DigitMask, KeyScalars},
  point::{DecodedPoint, PointKind},
  policy::{DuplicatePolicy, NaturalKey, assign_indices},
  revision::RevisionSchema,
  store::{Durability, NewLine, PointStore},
};
use navdb_sps::{DecodeContext, FieldDefaults, decode_record, is_header};

use crate::error::ImportError;

pub const DEFAULT_BATCH_SIZE: usize = 20_000;

// ─── CancelFlag ──────────────────────────────────────────────────────────────

/// Cooperative cancellation signal, checked at the top of the record loop
/// and between flushes — never mid-record. Cancelling drains already
/// buffered records so the store is left consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed); }

  pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

// ─── Options ─────────────────────────────────────────────────────────────────

/// Configuration for one import run. Everything is immutable for the run's
/// duration.
#[derive(Debug, Clone)]
pub struct ImportOptions {
  pub revision: RevisionSchema,
  /// The L/P grid mask driving key encoding.
  pub mask:     DigitMask,
  /// Optional L/X/S layout of the composite sail-line field; applied to
  /// source records only.
  pub sail_line_mask: Option<DigitMask>,
  pub kind:     PointKind,
  pub policy:   DuplicatePolicy,

  /// Campaign/phase identifier, `>= 1`.
  pub tier:         i64,
  /// Nominal line bearing, stored verbatim on every point.
  pub line_bearing: f64,
  /// Records per flush. Large enough to amortise transaction overhead,
  /// small enough to bound peak memory.
  pub batch_size:   usize,
  pub defaults:     FieldDefaults,
  pub durability:   Durability,
  /// First non-blank character marking a header/comment record.
  pub header_marker: char,
  /// Acquisition year for Julian-day timestamps; current year when unset.
  pub year: Option<i32>,
}

impl ImportOptions {
  pub fn new(
    revision: RevisionSchema,
    mask:     DigitMask,
    kind:     PointKind,
    policy:   DuplicatePolicy,
  ) -> Self {
    Self {
      revision,
      mask,
      sail_line_mask: None,
      kind,
      policy,
      tier: 1,
      line_bearing: 0.0,
      batch_size: DEFAULT_BATCH_SIZE,
      defaults: FieldDefaults::default(),
      durability: Durability::default(),
      header_marker: 'H',
      year: None,
    }
  }
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// The run's terminal report, also carried on a store failure to describe
/// what was durably committed before the abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
  pub file_fk:          i64,
  /// Data records encountered (headers and blank lines excluded).
  pub records_seen:     u64,
  /// Records decoded and durably committed.
  pub records_imported: u64,
  /// Records dropped by a decode failure.
  pub records_skipped:  u64,
  pub distinct_lines:   u64,
  pub cancelled:        bool,
}

// ─── Importer ────────────────────────────────────────────────────────────────

/// One importer per run, generic over the persistence backend.
#[derive(Debug)]
pub struct Importer<S> {
  store:   S,
  options: ImportOptions,
  scalars: KeyScalars,
}

impl<S: PointStore> Importer<S> {
  /// Validate the configuration and build the importer. All ConfigError
  /// conditions (malformed spans, mask without the needed digit letters,
  /// tier < 1, zero batch size) surface here, before any record is read.
  pub fn new(store: S, options: ImportOptions) -> navdb_core::Result<Self> {
    options.revision.validate()?;
    let scalars = KeyScalars::from_mask(&options.mask)?;
    if options.tier < 1 {
      return Err(navdb_core::Error::InvalidTier(options.tier));
    }
    if options.batch_size == 0 {
      return Err(navdb_core::Error::ZeroBatchSize);
    }
    if options.kind == PointKind::Source
      && let Some(sail) = &options.sail_line_mask
      && sail.span_of('L').is_none()
    {
      return Err(navdb_core::Error::MaskMissingAxis {
        mask: sail.as_str().to_string(),
        axis: "line",
      });
    }
    Ok(Self { store, options, scalars })
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn options(&self) -> &ImportOptions { &self.options }

  /// Process `records` start to finish and persist them under `file_name`.
  ///
  /// Decode failures skip the record and continue; store failures abort
  /// the run, roll back only the in-flight transaction, and report the
  /// committed counts in the error. Cancellation drains buffered records,
  /// flushes aggregates for them, and returns a summary with
  /// `cancelled = true`.
  pub async fn run<I>(
    &self,
    file_name: &str,
    records:   I,
    cancel:    &CancelFlag,
  ) -> Result<ImportSummary, ImportError<S::Error>>
  where
    I: IntoIterator<Item = String>,
  {
    let opts = &self.options;

    let mut ctx = DecodeContext::new(
      &opts.revision,
      &opts.mask,
      opts.tier,
      opts.line_bearing,
    )?
    .with_defaults(opts.defaults);
    if opts.kind == PointKind::Source {
      ctx = ctx.with_sail_mask(opts.sail_line_mask.as_ref());
    }
    if let Some(year) = opts.year {
      ctx = ctx.with_year(year);
    }

    let mut seen = 0u64;
    let mut skipped = 0u64;
    let mut committed = 0u64;
    let mut cancelled = false;

    let mut batch: Vec<DecodedPoint> = Vec::new();
    let mut aggregates = LineAggregates::new();
    let mut line_ids: HashMap<i64, i64> = HashMap::new();

    let snapshot =
      |file_fk, seen, committed, skipped, lines: usize, cancelled| {
        ImportSummary {
          file_fk,
          records_seen: seen,
          records_imported: committed,
          records_skipped: skipped,
          distinct_lines: lines as u64,
          cancelled,
        }
      };

    let file_fk = self
      .store
      .register_file(file_name)
      .await
      .map_err(|source| ImportError::Store {
        source,
        partial: snapshot(0, 0, 0, 0, 0, false),
      })?;

    self
      .store
      .prepare_import(opts.durability)
      .await
      .map_err(|source| ImportError::Store {
        source,
        partial: snapshot(file_fk, 0, 0, 0, 0, false),
      })?;

    tracing::info!(
      file_name,
      file_fk,
      kind = %opts.kind,
      policy = %opts.policy,
      tier = opts.tier,
      "import started"
    );

    for record in records {
      if cancel.is_cancelled() {
        cancelled = true;
        break;
      }
      if record.trim().is_empty() {
        continue;
      }
      if is_header(&record, opts.header_marker) {
        continue;
      }
      seen += 1;

      match decode_record(&record, &ctx) {
        Ok(point) => {
          aggregates.observe(&point);
          batch.push(point);
        }
        Err(err) => {
          skipped += 1;
          tracing::debug!(%err, record_no = seen, "record skipped");
          continue;
        }
      }

      if batch.len() >= opts.batch_size {
        let partial = snapshot(
          file_fk,
          seen,
          committed,
          skipped,
          line_ids.len(),
          false,
        );
        committed +=
          self.flush(&mut batch, &mut line_ids, file_fk, partial).await?;
      }
    }

    // Drain: the partial batch first, then the aggregates it feeds.
    let partial =
      snapshot(file_fk, seen, committed, skipped, line_ids.len(), cancelled);
    committed += self.flush(&mut batch, &mut line_ids, file_fk, partial).await?;

    let rows = aggregates.finalize();
    let partial =
      snapshot(file_fk, seen, committed, skipped, line_ids.len(), cancelled);
    self
      .store
      .update_line_aggregates(opts.kind, rows, file_fk)
      .await
      .map_err(|source| ImportError::Store {
        source,
        partial: partial.clone(),
      })?;

    self
      .store
      .finish_import()
      .await
      .map_err(|source| ImportError::Store { source, partial })?;

    let summary =
      snapshot(file_fk, seen, committed, skipped, line_ids.len(), cancelled);
    tracing::info!(
      records_seen = summary.records_seen,
      records_imported = summary.records_imported,
      records_skipped = summary.records_skipped,
      distinct_lines = summary.distinct_lines,
      cancelled = summary.cancelled,
      "import finished"
    );
    Ok(summary)
  }

  /// Persist one batch: ensure line rows, resolve surrogate ids, assign
  /// duplicate indices, insert. Returns the number of rows handed to the
  /// store (committed when it returns Ok).
  async fn flush(
    &self,
    batch:    &mut Vec<DecodedPoint>,
    line_ids: &mut HashMap<i64, i64>,
    file_fk:  i64,
    partial:  ImportSummary,
  ) -> Result<u64, ImportError<S::Error>> {
    if batch.is_empty() {
      return Ok(0);
    }
    let kind = self.options.kind;
    let policy = self.options.policy;

    // Line rows must exist before any point referencing them is written.
    let mut unseen: Vec<NewLine> = Vec::new();
    let mut requested: HashSet<i64> = HashSet::new();
    for p in batch.iter() {
      let tier_line = p.keys.tier_line;
      if !line_ids.contains_key(&tier_line) && requested.insert(tier_line) {
        unseen.push(NewLine { tier_line, tier: p.tier, line: p.line });
      }
    }
    if !unseen.is_empty() {
      let map = self
        .store
        .ensure_lines(kind, unseen, file_fk)
        .await
        .map_err(|source| ImportError::Store {
          source,
          partial: partial.clone(),
        })?;
      line_ids.extend(map);
    }
    for p in batch.iter_mut() {
      p.line_fk = line_ids.get(&p.keys.tier_line).copied();
    }

    let base_max = if policy == DuplicatePolicy::Add {
      let keys: Vec<NaturalKey> = batch
        .iter()
        .map(DecodedPoint::natural_key)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
      self
        .store
        .max_point_index(kind, keys)
        .await
        .map_err(|source| ImportError::Store {
          source,
          partial: partial.clone(),
        })?
    } else {
      HashMap::new()
    };

    assign_indices(batch, policy, &base_max, &self.scalars)?;

    let rows = std::mem::take(batch);
    let count = rows.len() as u64;
    self
      .store
      .insert_points(kind, rows, policy, file_fk)
      .await
      .map_err(|source| ImportError::Store { source, partial })?;

    tracing::debug!(count, "batch committed");
    Ok(count)
  }
}
