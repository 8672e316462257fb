//! The `PointStore` trait and supporting row types.
//!
//! The trait is implemented by storage backends (e.g. `navdb-store-sqlite`).
//! The import engine depends on this abstraction only; it never opens a
//! connection of its own, which is also what makes it trivially testable
//! against an in-memory store.

use std::{collections::HashMap, future::Future};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{
  aggregate::LineAggregateRow,
  point::{DecodedPoint, PointKind},
  policy::{DuplicatePolicy, NaturalKey},
};

// ─── Durability ──────────────────────────────────────────────────────────────

/// The durability/performance trade-off applied for the duration of an
/// import run.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
  /// WAL journal, `synchronous = NORMAL`. A crash can lose the in-flight
  /// transaction but never corrupts the store.
  #[default]
  Safe,
  /// Journal and fsync off. Fastest possible bulk load; a crash mid-run
  /// can corrupt the store, so only for rebuildable scratch databases.
  Aggressive,
}

// ─── Write-side rows ─────────────────────────────────────────────────────────

/// A line row to create (or reuse) ahead of the points that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLine {
  pub tier_line: i64,
  pub tier:      i64,
  pub line:      i64,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// One line row with its maintained aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct LineSummary {
  pub id:          i64,
  pub tier:        i64,
  pub line:        i64,
  pub tier_line:   i64,
  pub point_count: i64,
  pub first_point: Option<i64>,
  pub last_point:  Option<i64>,
  pub start_x:     Option<f64>,
  pub start_y:     Option<f64>,
  pub end_x:       Option<f64>,
  pub end_y:       Option<f64>,
  pub length:      f64,
  pub bearing:     f64,
}

/// One persisted point row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredPoint {
  pub tier:        i64,
  pub line:        i64,
  pub point:       i64,
  pub point_index: i64,
  pub line_fk:     i64,
  pub file_fk:     i64,
  pub x:           f64,
  pub y:           f64,
  pub z:           f64,
  pub water_depth: f64,
  pub point_code:  String,
  pub attempt:     Option<String>,
  pub sequence:    Option<i64>,
  pub acquired_at: Option<NaiveDateTime>,
  pub line_point:            i64,
  pub line_point_index:      i64,
  pub tier_line:             i64,
  pub tier_line_point:       i64,
  pub tier_line_point_index: i64,
  pub line_bearing: f64,
}

/// Whole-survey roll-up across one kind's line table.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SurveyTotals {
  pub lines:        i64,
  pub points:       i64,
  pub total_length: f64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a navdb storage backend.
///
/// The store owns every transaction boundary; callers never hold a
/// transaction open across more than one operation. All methods return
/// `Send` futures so the trait can be used from multi-threaded async
/// runtimes.
pub trait PointStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Import-run bracket ────────────────────────────────────────────────

  /// Register `file_name` in the import-file registry, returning its
  /// surrogate id. Idempotent: a name already registered returns the
  /// existing id.
  fn register_file<'a>(
    &'a self,
    file_name: &'a str,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Apply bulk-load tuning for an import run.
  fn prepare_import(
    &self,
    durability: Durability,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Restore post-import settings (re-enables foreign-key enforcement).
  fn finish_import(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Batch writes ──────────────────────────────────────────────────────

  /// Insert-or-ignore every line, then select the surrogate ids back.
  /// Returns `tier_line → id` for all requested lines.
  fn ensure_lines(
    &self,
    kind: PointKind,
    lines: Vec<NewLine>,
    file_fk: i64,
  ) -> impl Future<Output = Result<HashMap<i64, i64>, Self::Error>> + Send + '_;

  /// Highest persisted `point_index` per natural key. Keys with no
  /// persisted rows are absent from the result. Used only by the
  /// [`DuplicatePolicy::Add`] policy.
  fn max_point_index(
    &self,
    kind: PointKind,
    keys: Vec<NaturalKey>,
  ) -> impl Future<Output = Result<HashMap<NaturalKey, i64>, Self::Error>> + Send + '_;

  /// Persist one flush batch inside a single transaction. Every point must
  /// have `line_fk` resolved and `point_index` assigned; `policy` selects
  /// the conflict strategy (insert / ignore-if-present / overwrite).
  fn insert_points(
    &self,
    kind: PointKind,
    rows: Vec<DecodedPoint>,
    policy: DuplicatePolicy,
    file_fk: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Write finalized per-line aggregates, keyed by `(tier_line, file_fk)`,
  /// inside a single transaction.
  fn update_line_aggregates(
    &self,
    kind: PointKind,
    rows: Vec<LineAggregateRow>,
    file_fk: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All line rows of a kind, ordered by tier then tier_line.
  fn line_summaries(
    &self,
    kind: PointKind,
  ) -> impl Future<Output = Result<Vec<LineSummary>, Self::Error>> + Send + '_;

  /// All point rows of one line, ordered by point then point_index.
  fn line_points(
    &self,
    kind: PointKind,
    tier_line: i64,
  ) -> impl Future<Output = Result<Vec<StoredPoint>, Self::Error>> + Send + '_;

  /// Distinct-line count, total point count, and summed line length.
  fn survey_totals(
    &self,
    kind: PointKind,
  ) -> impl Future<Output = Result<SurveyTotals, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Delete the given lines and (via cascade) their points. Returns the
  /// number of line rows removed.
  fn delete_lines(
    &self,
    kind: PointKind,
    tier_lines: Vec<i64>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Recompute every line's aggregates from its stored points. A recovery
  /// operation only — the importer maintains aggregates incrementally.
  fn rebuild_line_aggregates(
    &self,
    kind: PointKind,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
