//! Integration tests for the importer against an in-memory SQLite store.

use navdb_core::{
  geometry::DigitMask,
  point::PointKind,
  policy::DuplicatePolicy,
  revision::{FieldSpan, RevisionSchema},
  store::PointStore,
};
use navdb_store_sqlite::SqliteStore;

use crate::{CancelFlag, ImportOptions, Importer};

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// A compact fixed-width layout so fixture records stay readable.
fn test_schema() -> RevisionSchema {
  RevisionSchema {
    name:              "test".to_string(),
    record:            FieldSpan::new(0, 1),
    line:              FieldSpan::new(1, 9),
    point:             FieldSpan::new(9, 17),
    point_index:       FieldSpan::new(17, 19),
    point_code:        FieldSpan::new(19, 23),
    static_correction: FieldSpan::default(),
    point_depth:       FieldSpan::default(),
    datum:             FieldSpan::default(),
    uphole_time:       FieldSpan::default(),
    water_depth:       FieldSpan::new(49, 55),
    easting:           FieldSpan::new(23, 33),
    northing:          FieldSpan::new(33, 43),
    elevation:         FieldSpan::new(43, 49),
    julian_day:        FieldSpan::default(),
    hour:              FieldSpan::default(),
    minute:            FieldSpan::default(),
    second:            FieldSpan::default(),
    microsecond:       FieldSpan::default(),
  }
}

fn record(line: i64, point: i64, x: f64, y: f64) -> String {
  format!(
    "R{line:>8}{point:>8}{idx:>2}{code:>4}{x:>10.1}{y:>10.1}{z:>6.1}{wd:>6.1}",
    idx = "",
    code = "G1",
    z = 0.0,
    wd = 12.5,
  )
}

async fn importer(
  policy:     DuplicatePolicy,
  batch_size: usize,
) -> Importer<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let mask = DigitMask::new("LLLLPPPP").unwrap();
  let mut options =
    ImportOptions::new(test_schema(), mask, PointKind::Receiver, policy);
  options.batch_size = batch_size;
  Importer::new(store, options).unwrap()
}

fn tier_line(line: i64) -> i64 { 100_000 + line }

// ─── Counting & skipping ─────────────────────────────────────────────────────

#[tokio::test]
async fn counts_headers_blanks_and_skips() {
  let imp = importer(DuplicatePolicy::Add, 1000).await;

  let records = vec![
    "H26 header record".to_string(),
    String::new(),
    record(100, 1, 0.0, 0.0),
    record(100, 2, 0.0, 25.0),
    // line column blank → decode failure → skipped, not fatal
    "R        {bad}".to_string(),
    record(101, 1, 10.0, 0.0),
  ];

  let summary = imp
    .run("skips.sps", records, &CancelFlag::new())
    .await
    .unwrap();

  assert_eq!(summary.records_seen, 4);
  assert_eq!(summary.records_imported, 3);
  assert_eq!(summary.records_skipped, 1);
  assert_eq!(summary.distinct_lines, 2);
  assert!(!summary.cancelled);

  let totals = imp
    .store()
    .survey_totals(PointKind::Receiver)
    .await
    .unwrap();
  assert_eq!(totals.lines, 2);
  assert_eq!(totals.points, 3);
}

// ─── Duplicate policies ──────────────────────────────────────────────────────

#[tokio::test]
async fn add_assigns_indices_across_batches() {
  // Three occurrences of the same point split 2 + 1 across flush batches.
  let imp = importer(DuplicatePolicy::Add, 2).await;

  let records = vec![
    record(100, 5, 1.0, 1.0),
    record(100, 5, 2.0, 2.0),
    record(100, 5, 3.0, 3.0),
  ];
  let summary = imp
    .run("dups.sps", records, &CancelFlag::new())
    .await
    .unwrap();
  assert_eq!(summary.records_imported, 3);

  let points = imp
    .store()
    .line_points(PointKind::Receiver, tier_line(100))
    .await
    .unwrap();
  let indices: Vec<i64> = points.iter().map(|p| p.point_index).collect();
  assert_eq!(indices, vec![1, 2, 3]);

  // The stored composites agree with the resolved index.
  for p in &points {
    assert_eq!(p.line_point_index, p.line_point * 10 + p.point_index);
  }
}

#[tokio::test]
async fn add_reimport_continues_numbering() {
  let imp = importer(DuplicatePolicy::Add, 1000).await;
  let records =
    vec![record(100, 5, 1.0, 1.0), record(100, 5, 2.0, 2.0)];

  imp
    .run("a.sps", records.clone(), &CancelFlag::new())
    .await
    .unwrap();
  imp.run("a.sps", records, &CancelFlag::new()).await.unwrap();

  let points = imp
    .store()
    .line_points(PointKind::Receiver, tier_line(100))
    .await
    .unwrap();
  let indices: Vec<i64> = points.iter().map(|p| p.point_index).collect();
  assert_eq!(indices, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn keep_first_preserves_existing_rows() {
  let imp = importer(DuplicatePolicy::KeepFirst, 1000).await;

  imp
    .run(
      "first.sps",
      vec![record(100, 1, 1.0, 1.0), record(100, 2, 2.0, 2.0)],
      &CancelFlag::new(),
    )
    .await
    .unwrap();
  imp
    .run(
      "second.sps",
      vec![record(100, 1, 9.0, 9.0), record(100, 2, 8.0, 8.0)],
      &CancelFlag::new(),
    )
    .await
    .unwrap();

  let points = imp
    .store()
    .line_points(PointKind::Receiver, tier_line(100))
    .await
    .unwrap();
  assert_eq!(points.len(), 2);
  assert_eq!(points[0].x, 1.0);
  assert_eq!(points[1].x, 2.0);
  assert!(points.iter().all(|p| p.point_index == 1));
}

#[tokio::test]
async fn keep_last_overwrites_coordinates() {
  let imp = importer(DuplicatePolicy::KeepLast, 1000).await;

  imp
    .run(
      "file_a.sps",
      vec![record(100, 1, 1.0, 1.0), record(100, 2, 2.0, 2.0)],
      &CancelFlag::new(),
    )
    .await
    .unwrap();
  imp
    .run(
      "file_b.sps",
      vec![record(100, 1, 9.0, 9.5), record(100, 2, 8.0, 8.5)],
      &CancelFlag::new(),
    )
    .await
    .unwrap();

  let points = imp
    .store()
    .line_points(PointKind::Receiver, tier_line(100))
    .await
    .unwrap();
  assert_eq!(points.len(), 2);
  assert_eq!(points[0].x, 9.0);
  assert_eq!(points[0].y, 9.5);
  assert_eq!(points[1].x, 8.0);
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn line_length_and_bearing() {
  let imp = importer(DuplicatePolicy::Add, 1000).await;

  let records = vec![
    // line 100 runs due north, line 101 due east
    record(100, 1, 0.0, 0.0),
    record(100, 2, 0.0, 100.0),
    record(101, 1, 0.0, 0.0),
    record(101, 2, 100.0, 0.0),
  ];
  imp
    .run("bearing.sps", records, &CancelFlag::new())
    .await
    .unwrap();

  let lines = imp
    .store()
    .line_summaries(PointKind::Receiver)
    .await
    .unwrap();
  assert_eq!(lines.len(), 2);

  let north = &lines[0];
  assert_eq!(north.line, 100);
  assert_eq!(north.point_count, 2);
  assert_eq!(north.first_point, Some(1));
  assert_eq!(north.last_point, Some(2));
  assert!((north.length - 100.0).abs() < 1e-9);
  assert!(north.bearing.abs() < 1e-9);

  let east = &lines[1];
  assert_eq!(east.line, 101);
  assert!((east.bearing - 90.0).abs() < 1e-9);
}

#[tokio::test]
async fn batch_size_does_not_change_results() {
  let mut records = Vec::new();
  for line in [100, 101, 102] {
    for point in 1..=30 {
      records.push(record(line, point, point as f64 * 12.5, line as f64));
    }
  }
  // a few duplicates spread across batch boundaries
  records.push(record(101, 7, 1.0, 1.0));
  records.push(record(102, 30, 2.0, 2.0));

  let small = importer(DuplicatePolicy::Add, 7).await;
  let big = importer(DuplicatePolicy::Add, 50_000).await;
  let summary_small = small
    .run("p6.sps", records.clone(), &CancelFlag::new())
    .await
    .unwrap();
  let summary_big =
    big.run("p6.sps", records, &CancelFlag::new()).await.unwrap();
  assert_eq!(summary_small, summary_big);

  for line in [100, 101, 102] {
    let a = small
      .store()
      .line_points(PointKind::Receiver, tier_line(line))
      .await
      .unwrap();
    let b = big
      .store()
      .line_points(PointKind::Receiver, tier_line(line))
      .await
      .unwrap();
    let key = |p: &navdb_core::store::StoredPoint| {
      (p.point, p.point_index, p.x.to_bits(), p.y.to_bits())
    };
    assert_eq!(
      a.iter().map(key).collect::<Vec<_>>(),
      b.iter().map(key).collect::<Vec<_>>()
    );
  }

  let lines_a = small
    .store()
    .line_summaries(PointKind::Receiver)
    .await
    .unwrap();
  let lines_b = big
    .store()
    .line_summaries(PointKind::Receiver)
    .await
    .unwrap();
  let key = |l: &navdb_core::store::LineSummary| {
    (l.tier_line, l.point_count, l.length.to_bits(), l.bearing.to_bits())
  };
  assert_eq!(
    lines_a.iter().map(key).collect::<Vec<_>>(),
    lines_b.iter().map(key).collect::<Vec<_>>()
  );
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_drains_buffered_records() {
  let imp = importer(DuplicatePolicy::Add, 1000).await;

  let flag = CancelFlag::new();
  let trip = flag.clone();
  let records: Vec<String> =
    (1..=10).map(|p| record(100, p, p as f64, 0.0)).collect();
  // Trip the flag while the fourth record is being pulled; the loop sees
  // it before that record is decoded.
  let stream = records.into_iter().enumerate().map(move |(i, r)| {
    if i == 3 {
      trip.cancel();
    }
    r
  });

  let summary = imp.run("cancel.sps", stream, &flag).await.unwrap();
  assert!(summary.cancelled);
  assert_eq!(summary.records_seen, 3);
  assert_eq!(summary.records_imported, 3);

  // Buffered records were flushed and their aggregates written.
  let lines = imp
    .store()
    .line_summaries(PointKind::Receiver)
    .await
    .unwrap();
  assert_eq!(lines.len(), 1);
  assert_eq!(lines[0].point_count, 3);
  assert_eq!(lines[0].last_point, Some(3));
}

// ─── Kinds & sail lines ──────────────────────────────────────────────────────

#[tokio::test]
async fn kinds_use_disjoint_tables() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let mask = DigitMask::new("LLLLPPPP").unwrap();

  let receiver = Importer::new(
    store.clone(),
    ImportOptions::new(
      test_schema(),
      mask.clone(),
      PointKind::Receiver,
      DuplicatePolicy::Add,
    ),
  )
  .unwrap();
  let qc = Importer::new(
    store.clone(),
    ImportOptions::new(
      test_schema(),
      mask,
      PointKind::QcFix,
      DuplicatePolicy::KeepLast,
    ),
  )
  .unwrap();

  receiver
    .run(
      "r.sps",
      vec![record(100, 1, 0.0, 0.0)],
      &CancelFlag::new(),
    )
    .await
    .unwrap();
  qc.run(
    "q.sps",
    vec![record(200, 1, 0.0, 0.0), record(200, 2, 5.0, 5.0)],
    &CancelFlag::new(),
  )
  .await
  .unwrap();

  let r = store.survey_totals(PointKind::Receiver).await.unwrap();
  let q = store.survey_totals(PointKind::QcFix).await.unwrap();
  assert_eq!((r.lines, r.points), (1, 1));
  assert_eq!((q.lines, q.points), (1, 2));
}

#[tokio::test]
async fn source_records_carry_attempt_and_sequence() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let mut options = ImportOptions::new(
    test_schema(),
    DigitMask::new("LLLLPPPP").unwrap(),
    PointKind::Source,
    DuplicatePolicy::Add,
  );
  options.sail_line_mask = Some(DigitMask::new("LLLXSSS").unwrap());
  let imp = Importer::new(store, options).unwrap();

  // Line column carries the composite sail-line "100A012".
  let mut rec = record(0, 4250, 100.0, 200.0);
  rec.replace_range(1..9, " 100A012");

  let summary = imp
    .run("sail.sps", vec![rec], &CancelFlag::new())
    .await
    .unwrap();
  assert_eq!(summary.records_imported, 1);

  let points = imp
    .store()
    .line_points(PointKind::Source, tier_line(100))
    .await
    .unwrap();
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].line, 100);
  assert_eq!(points[0].attempt.as_deref(), Some("A"));
  assert_eq!(points[0].sequence, Some(12));
}

// ─── Configuration failures ──────────────────────────────────────────────────

#[tokio::test]
async fn mask_without_point_digits_fails_before_any_record() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let options = ImportOptions::new(
    test_schema(),
    DigitMask::new("LLLLXSSSS").unwrap(),
    PointKind::Receiver,
    DuplicatePolicy::Add,
  );
  let err = Importer::new(store, options).unwrap_err();
  assert!(matches!(err, navdb_core::Error::MaskMissingAxis { .. }));
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let mut options = ImportOptions::new(
    test_schema(),
    DigitMask::new("LLLLPPPP").unwrap(),
    PointKind::Receiver,
    DuplicatePolicy::Add,
  );
  options.batch_size = 0;
  let err = Importer::new(store, options).unwrap_err();
  assert!(matches!(err, navdb_core::Error::ZeroBatchSize));
}
