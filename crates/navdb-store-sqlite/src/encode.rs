//! Encoding helpers between domain types and the plain-text/numeric
//! representations stored in SQLite columns.
//!
//! Acquisition timestamps are stored as ISO 8601 strings without a zone
//! (field time is whatever the vessel clock recorded). Everything else maps
//! directly to INTEGER/REAL/TEXT columns.

use chrono::NaiveDateTime;
use navdb_core::store::StoredPoint;

use crate::{Error, Result};

const DT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn encode_dt(dt: NaiveDateTime) -> String {
  dt.format(DT_FORMAT).to_string()
}

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, DT_FORMAT)
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Column list shared by every point-insert statement, in bind order.
pub const POINT_COLUMNS: &str = "tier, line, point, point_index, \
   line_fk, file_fk, \
   x, y, z, water_depth, point_code, attempt, sequence, acquired_at, \
   line_point, line_point_index, tier_line, tier_line_point, \
   tier_line_point_index, line_bearing";

pub const POINT_PLACEHOLDERS: &str = "?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, \
   ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a point row before timestamp decoding.
pub struct RawStoredPoint {
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
  pub acquired_at: Option<String>,
  pub line_point:            i64,
  pub line_point_index:      i64,
  pub tier_line:             i64,
  pub tier_line_point:       i64,
  pub tier_line_point_index: i64,
  pub line_bearing: f64,
}

impl RawStoredPoint {
  pub fn into_stored(self) -> Result<StoredPoint> {
    let acquired_at = self
      .acquired_at
      .as_deref()
      .map(decode_dt)
      .transpose()?;

    Ok(StoredPoint {
      tier: self.tier,
      line: self.line,
      point: self.point,
      point_index: self.point_index,
      line_fk: self.line_fk,
      file_fk: self.file_fk,
      x: self.x,
      y: self.y,
      z: self.z,
      water_depth: self.water_depth,
      point_code: self.point_code,
      attempt: self.attempt,
      sequence: self.sequence,
      acquired_at,
      line_point: self.line_point,
      line_point_index: self.line_point_index,
      tier_line: self.tier_line,
      tier_line_point: self.tier_line_point,
      tier_line_point_index: self.tier_line_point_index,
      line_bearing: self.line_bearing,
    })
  }
}
