//! Streaming per-line aggregates.
//!
//! One [`LineAggregates`] instance lives for the duration of an import run
//! and observes every accepted record in a single pass: O(n) time, memory
//! proportional to the number of distinct lines. First/last occurrence is
//! decided by natural ordering on `(point, point_index)`, not file order, so
//! the result is independent of record ordering and batch boundaries.

use std::collections::HashMap;

use crate::point::DecodedPoint;

// ─── Tracker ─────────────────────────────────────────────────────────────────

/// Running state for one distinct `tier_line`.
#[derive(Debug, Clone)]
struct LineTracker {
  tier:        i64,
  line:        i64,
  point_count: i64,
  first_key:   (i64, i64),
  last_key:    (i64, i64),
  start_x:     f64,
  start_y:     f64,
  end_x:       f64,
  end_y:       f64,
}

// ─── LineAggregates ──────────────────────────────────────────────────────────

/// The running aggregate map for one import run, keyed by `tier_line`.
#[derive(Debug, Default)]
pub struct LineAggregates {
  lines: HashMap<i64, LineTracker>,
}

impl LineAggregates {
  pub fn new() -> Self { Self::default() }

  /// Number of distinct lines observed so far.
  pub fn len(&self) -> usize { self.lines.len() }

  pub fn is_empty(&self) -> bool { self.lines.is_empty() }

  /// Fold one accepted record into its line's running aggregate.
  pub fn observe(&mut self, p: &DecodedPoint) {
    let key = p.order_key();
    match self.lines.entry(p.keys.tier_line) {
      std::collections::hash_map::Entry::Vacant(slot) => {
        slot.insert(LineTracker {
          tier:        p.tier,
          line:        p.line,
          point_count: 1,
          first_key:   key,
          last_key:    key,
          start_x:     p.easting,
          start_y:     p.northing,
          end_x:       p.easting,
          end_y:       p.northing,
        });
      }
      std::collections::hash_map::Entry::Occupied(mut slot) => {
        let t = slot.get_mut();
        t.point_count += 1;
        if key < t.first_key {
          t.first_key = key;
          t.start_x = p.easting;
          t.start_y = p.northing;
        }
        if key > t.last_key {
          t.last_key = key;
          t.end_x = p.easting;
          t.end_y = p.northing;
        }
      }
    }
  }

  /// Derive the persistable rows, ordered by `tier_line` for deterministic
  /// flush order.
  pub fn finalize(self) -> Vec<LineAggregateRow> {
    let mut rows: Vec<LineAggregateRow> = self
      .lines
      .into_iter()
      .map(|(tier_line, t)| {
        let dx = t.end_x - t.start_x;
        let dy = t.end_y - t.start_y;
        LineAggregateRow {
          tier_line,
          tier: t.tier,
          line: t.line,
          point_count: t.point_count,
          first_point: t.first_key.0,
          last_point: t.last_key.0,
          start_x: t.start_x,
          start_y: t.start_y,
          end_x: t.end_x,
          end_y: t.end_y,
          length: dx.hypot(dy),
          bearing: bearing_degrees(dx, dy),
        }
      })
      .collect();
    rows.sort_by_key(|r| r.tier_line);
    rows
  }
}

/// Compass azimuth of the `(dx, dy)` displacement: 0–360°, 0° = grid north.
pub fn bearing_degrees(dx: f64, dy: f64) -> f64 {
  (dx.atan2(dy).to_degrees() + 360.0) % 360.0
}

// ─── LineAggregateRow ────────────────────────────────────────────────────────

/// A finalized per-line aggregate, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct LineAggregateRow {
  pub tier_line:   i64,
  pub tier:        i64,
  pub line:        i64,
  pub point_count: i64,
  pub first_point: i64,
  pub last_point:  i64,
  pub start_x:     f64,
  pub start_y:     f64,
  pub end_x:       f64,
  pub end_y:       f64,
  pub length:      f64,
  pub bearing:     f64,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
