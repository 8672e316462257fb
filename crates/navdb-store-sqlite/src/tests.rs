//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::HashMap;

use chrono::NaiveDate;
use navdb_core::{
  aggregate::LineAggregateRow,
  geometry::{DigitMask, KeyScalars},
  keys,
  point::{DecodedPoint, PointKind},
  policy::DuplicatePolicy,
  store::{Durability, NewLine, PointStore},
};

use crate::SqliteStore;

const KIND: PointKind = PointKind::Receiver;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn scalars() -> KeyScalars {
  KeyScalars::from_mask(&DigitMask::new("LLLLPPPP").unwrap()).unwrap()
}

fn decoded(line: i64, point: i64, index: i64, x: f64, y: f64) -> DecodedPoint {
  DecodedPoint {
    tier: 1,
    line,
    point,
    point_index: index,
    point_code: "G1".to_string(),
    easting: x,
    northing: y,
    elevation: -4.5,
    water_depth: 31.0,
    attempt: None,
    sequence: None,
    acquired_at: None,
    line_bearing: 42.0,
    keys: keys::encode(1, line, point, index, &scalars()).unwrap(),
    line_fk: None,
  }
}

/// Ensure the lines for `points` and resolve their `line_fk`s.
async fn with_lines(
  s: &SqliteStore,
  mut points: Vec<DecodedPoint>,
  file_fk: i64,
) -> Vec<DecodedPoint> {
  let mut lines: Vec<NewLine> = Vec::new();
  for p in &points {
    let l = NewLine { tier_line: p.keys.tier_line, tier: p.tier, line: p.line };
    if !lines.contains(&l) {
      lines.push(l);
    }
  }
  let map = s.ensure_lines(KIND, lines, file_fk).await.unwrap();
  for p in &mut points {
    p.line_fk = map.get(&p.keys.tier_line).copied();
  }
  points
}

fn tier_line(line: i64) -> i64 { 100_000 + line }

// ─── File registry ───────────────────────────────────────────────────────────

#[tokio::test]
async fn register_file_is_idempotent() {
  let s = store().await;
  let a = s.register_file("swath_1.sps").await.unwrap();
  let b = s.register_file("swath_1.sps").await.unwrap();
  let c = s.register_file("swath_2.sps").await.unwrap();
  assert_eq!(a, b);
  assert_ne!(a, c);
}

// ─── Lines ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ensure_lines_creates_then_reuses() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();

  let lines = vec![
    NewLine { tier_line: tier_line(100), tier: 1, line: 100 },
    NewLine { tier_line: tier_line(101), tier: 1, line: 101 },
  ];
  let first = s.ensure_lines(KIND, lines.clone(), file_fk).await.unwrap();
  assert_eq!(first.len(), 2);

  let second = s.ensure_lines(KIND, lines, file_fk).await.unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn ensure_lines_empty_input() {
  let s = store().await;
  let map = s.ensure_lines(KIND, Vec::new(), 1).await.unwrap();
  assert!(map.is_empty());
}

// ─── Point inserts per policy ────────────────────────────────────────────────

#[tokio::test]
async fn add_inserts_every_row() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();
  let points = with_lines(
    &s,
    vec![decoded(100, 5, 1, 1.0, 1.0), decoded(100, 5, 2, 2.0, 2.0)],
    file_fk,
  )
  .await;

  s.insert_points(KIND, points, DuplicatePolicy::Add, file_fk)
    .await
    .unwrap();

  let stored = s.line_points(KIND, tier_line(100)).await.unwrap();
  assert_eq!(stored.len(), 2);
  assert_eq!(stored[0].point_index, 1);
  assert_eq!(stored[1].point_index, 2);
}

#[tokio::test]
async fn keep_first_ignores_conflicts() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();

  let first =
    with_lines(&s, vec![decoded(100, 5, 1, 1.0, 1.0)], file_fk).await;
  s.insert_points(KIND, first, DuplicatePolicy::KeepFirst, file_fk)
    .await
    .unwrap();

  let second =
    with_lines(&s, vec![decoded(100, 5, 1, 9.0, 9.0)], file_fk).await;
  s.insert_points(KIND, second, DuplicatePolicy::KeepFirst, file_fk)
    .await
    .unwrap();

  let stored = s.line_points(KIND, tier_line(100)).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].x, 1.0);
}

#[tokio::test]
async fn keep_last_overwrites_non_key_columns() {
  let s = store().await;
  let a = s.register_file("a.sps").await.unwrap();
  let b = s.register_file("b.sps").await.unwrap();

  let first = with_lines(&s, vec![decoded(100, 5, 1, 1.0, 1.0)], a).await;
  s.insert_points(KIND, first, DuplicatePolicy::KeepLast, a)
    .await
    .unwrap();

  let mut replacement = decoded(100, 5, 1, 9.0, 9.5);
  replacement.point_code = "G2".to_string();
  let second = with_lines(&s, vec![replacement], b).await;
  s.insert_points(KIND, second, DuplicatePolicy::KeepLast, b)
    .await
    .unwrap();

  let stored = s.line_points(KIND, tier_line(100)).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].x, 9.0);
  assert_eq!(stored[0].y, 9.5);
  assert_eq!(stored[0].point_code, "G2");
  assert_eq!(stored[0].file_fk, b);
}

#[tokio::test]
async fn acquired_at_round_trips() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();

  let mut p = decoded(100, 5, 1, 1.0, 1.0);
  let stamp = NaiveDate::from_ymd_opt(2024, 9, 30)
    .unwrap()
    .and_hms_micro_opt(12, 30, 45, 250_000)
    .unwrap();
  p.acquired_at = Some(stamp);
  p.attempt = Some("A".to_string());
  p.sequence = Some(12);

  let points = with_lines(&s, vec![p], file_fk).await;
  s.insert_points(KIND, points, DuplicatePolicy::Add, file_fk)
    .await
    .unwrap();

  let stored = s.line_points(KIND, tier_line(100)).await.unwrap();
  assert_eq!(stored[0].acquired_at, Some(stamp));
  assert_eq!(stored[0].attempt.as_deref(), Some("A"));
  assert_eq!(stored[0].sequence, Some(12));
}

// ─── Max point index ─────────────────────────────────────────────────────────

#[tokio::test]
async fn max_point_index_reports_only_persisted_keys() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();
  let points = with_lines(
    &s,
    vec![
      decoded(100, 5, 1, 1.0, 1.0),
      decoded(100, 5, 2, 2.0, 2.0),
      decoded(100, 6, 1, 3.0, 3.0),
    ],
    file_fk,
  )
  .await;
  s.insert_points(KIND, points, DuplicatePolicy::Add, file_fk)
    .await
    .unwrap();

  let max = s
    .max_point_index(
      KIND,
      vec![(1, 100, 5), (1, 100, 6), (1, 100, 7)],
    )
    .await
    .unwrap();
  assert_eq!(
    max,
    HashMap::from([((1, 100, 5), 2), ((1, 100, 6), 1)])
  );
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

fn aggregate_row(line: i64) -> LineAggregateRow {
  LineAggregateRow {
    tier_line: tier_line(line),
    tier: 1,
    line,
    point_count: 2,
    first_point: 1,
    last_point: 2,
    start_x: 0.0,
    start_y: 0.0,
    end_x: 0.0,
    end_y: 100.0,
    length: 100.0,
    bearing: 0.0,
  }
}

#[tokio::test]
async fn aggregates_update_and_read_back() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();
  s.ensure_lines(
    KIND,
    vec![NewLine { tier_line: tier_line(100), tier: 1, line: 100 }],
    file_fk,
  )
  .await
  .unwrap();

  s.update_line_aggregates(KIND, vec![aggregate_row(100)], file_fk)
    .await
    .unwrap();

  let lines = s.line_summaries(KIND).await.unwrap();
  assert_eq!(lines.len(), 1);
  assert_eq!(lines[0].point_count, 2);
  assert_eq!(lines[0].first_point, Some(1));
  assert_eq!(lines[0].end_y, Some(100.0));
  assert_eq!(lines[0].length, 100.0);

  let totals = s.survey_totals(KIND).await.unwrap();
  assert_eq!(totals.lines, 1);
  assert_eq!(totals.points, 2);
  assert_eq!(totals.total_length, 100.0);
}

#[tokio::test]
async fn aggregate_update_is_scoped_to_owning_file() {
  let s = store().await;
  let a = s.register_file("a.sps").await.unwrap();
  let b = s.register_file("b.sps").await.unwrap();
  s.ensure_lines(
    KIND,
    vec![NewLine { tier_line: tier_line(100), tier: 1, line: 100 }],
    a,
  )
  .await
  .unwrap();

  // The line belongs to file A; an update keyed to file B touches nothing.
  s.update_line_aggregates(KIND, vec![aggregate_row(100)], b)
    .await
    .unwrap();
  let untouched = s.line_summaries(KIND).await.unwrap();
  assert_eq!(untouched[0].point_count, 0);

  s.update_line_aggregates(KIND, vec![aggregate_row(100)], a)
    .await
    .unwrap();
  let updated = s.line_summaries(KIND).await.unwrap();
  assert_eq!(updated[0].point_count, 2);
}

// ─── Delete & rebuild ────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_lines_cascades_to_points() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();
  let points = with_lines(
    &s,
    vec![
      decoded(100, 1, 1, 0.0, 0.0),
      decoded(100, 2, 1, 0.0, 25.0),
      decoded(101, 1, 1, 5.0, 0.0),
    ],
    file_fk,
  )
  .await;
  s.insert_points(KIND, points, DuplicatePolicy::Add, file_fk)
    .await
    .unwrap();

  let deleted = s.delete_lines(KIND, vec![tier_line(100)]).await.unwrap();
  assert_eq!(deleted, 1);

  assert!(s.line_points(KIND, tier_line(100)).await.unwrap().is_empty());
  assert_eq!(s.line_points(KIND, tier_line(101)).await.unwrap().len(), 1);
  assert_eq!(s.line_summaries(KIND).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rebuild_recomputes_from_stored_points() {
  let s = store().await;
  let file_fk = s.register_file("f.sps").await.unwrap();
  let points = with_lines(
    &s,
    vec![
      decoded(100, 2, 1, 0.0, 100.0),
      decoded(100, 1, 1, 0.0, 0.0),
      decoded(100, 1, 2, 0.0, 10.0),
    ],
    file_fk,
  )
  .await;
  s.insert_points(KIND, points, DuplicatePolicy::Add, file_fk)
    .await
    .unwrap();

  // Line row still carries default aggregates until the rebuild.
  s.rebuild_line_aggregates(KIND).await.unwrap();

  let lines = s.line_summaries(KIND).await.unwrap();
  assert_eq!(lines[0].point_count, 3);
  assert_eq!(lines[0].first_point, Some(1));
  assert_eq!(lines[0].last_point, Some(2));
  assert_eq!(lines[0].start_y, Some(0.0));
  assert_eq!(lines[0].end_y, Some(100.0));
  assert!((lines[0].length - 100.0).abs() < 1e-9);
  assert!(lines[0].bearing.abs() < 1e-9);
}

// ─── Pragma bracket ──────────────────────────────────────────────────────────

#[tokio::test]
async fn import_bracket_round_trips() {
  let s = store().await;
  s.prepare_import(Durability::Safe).await.unwrap();
  s.finish_import().await.unwrap();
  s.prepare_import(Durability::Aggressive).await.unwrap();
  s.finish_import().await.unwrap();
}
