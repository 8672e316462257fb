//! Point kinds and the decoded in-flight record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, keys::CompositeKeys};

// ─── PointKind ───────────────────────────────────────────────────────────────

/// The physical family of an observation record. Each kind owns its own
/// line and point tables in the store; the import pipeline is otherwise
/// identical across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
  /// A receiver (node/geophone) position.
  Receiver,
  /// A source shot position.
  Source,
  /// A survey-QC fix (deployment/retrieval verification).
  QcFix,
}

impl PointKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Receiver => "receiver",
      Self::Source => "source",
      Self::QcFix => "qc_fix",
    }
  }
}

impl std::str::FromStr for PointKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "receiver" => Ok(Self::Receiver),
      "source" => Ok(Self::Source),
      "qc_fix" => Ok(Self::QcFix),
      other => Err(Error::UnknownPointKind(other.to_string())),
    }
  }
}

impl std::fmt::Display for PointKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── DecodedPoint ────────────────────────────────────────────────────────────

/// One decoded observation, alive from record decode until batch flush.
///
/// `point_index` starts at the value decoded from the record (1 when the
/// column is blank) and is rewritten by the duplicate policy before
/// persistence; `line_fk` starts unset and is resolved against the line
/// table before the point is written.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPoint {
  pub tier:        i64,
  pub line:        i64,
  pub point:       i64,
  pub point_index: i64,

  pub point_code: String,
  pub easting:    f64,
  pub northing:   f64,
  pub elevation:  f64,
  pub water_depth: f64,

  /// Sail-line attempt letter, source shots only.
  pub attempt:  Option<String>,
  /// Sail-line sequence number, source shots only.
  pub sequence: Option<i64>,

  /// Acquisition time composed from the record's Julian-day/time columns.
  pub acquired_at: Option<NaiveDateTime>,

  /// Caller-supplied nominal bearing, stored verbatim on every point.
  pub line_bearing: f64,

  pub keys:    CompositeKeys,
  pub line_fk: Option<i64>,
}

impl DecodedPoint {
  /// The natural identity of the physical position.
  pub fn natural_key(&self) -> (i64, i64, i64) {
    (self.tier, self.line, self.point)
  }

  /// Ordering key used to decide first/last occurrence along a line.
  pub fn order_key(&self) -> (i64, i64) {
    (self.point, self.point_index)
  }
}
