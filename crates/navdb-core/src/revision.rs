//! SPS revision definitions — the fixed-width column layout of a record.
//!
//! A revision maps every semantic field to a `[start, end)` character span
//! inside the record. One instance is created from configuration per import
//! run and shared read-only for the whole file. A span of `0..0` means the
//! field is not present in that revision.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── FieldSpan ───────────────────────────────────────────────────────────────

/// A half-open `[start, end)` character span, zero-based.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct FieldSpan {
  pub start: usize,
  pub end:   usize,
}

impl FieldSpan {
  pub const fn new(start: usize, end: usize) -> Self { Self { start, end } }

  /// True for the `0..0` "field absent in this revision" marker.
  pub fn is_absent(&self) -> bool { self.start == 0 && self.end == 0 }
}

// ─── RevisionSchema ──────────────────────────────────────────────────────────

/// Column layout for one SPS revision. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionSchema {
  pub name: String,

  #[serde(default)]
  pub record:            FieldSpan,
  #[serde(default)]
  pub line:              FieldSpan,
  #[serde(default)]
  pub point:             FieldSpan,
  #[serde(default)]
  pub point_index:       FieldSpan,
  #[serde(default)]
  pub point_code:        FieldSpan,
  #[serde(default)]
  pub static_correction: FieldSpan,
  #[serde(default)]
  pub point_depth:       FieldSpan,
  #[serde(default)]
  pub datum:             FieldSpan,
  #[serde(default)]
  pub uphole_time:       FieldSpan,
  #[serde(default)]
  pub water_depth:       FieldSpan,
  #[serde(default)]
  pub easting:           FieldSpan,
  #[serde(default)]
  pub northing:          FieldSpan,
  #[serde(default)]
  pub elevation:         FieldSpan,
  #[serde(default)]
  pub julian_day:        FieldSpan,
  #[serde(default)]
  pub hour:              FieldSpan,
  #[serde(default)]
  pub minute:            FieldSpan,
  #[serde(default)]
  pub second:            FieldSpan,
  #[serde(default)]
  pub microsecond:       FieldSpan,
}

impl RevisionSchema {
  /// SPS revision 0 ("Rev01") — the classic 80-column layout.
  pub fn rev_0() -> Self {
    Self {
      name:              "Rev0".to_string(),
      record:            FieldSpan::new(0, 1),
      line:              FieldSpan::new(1, 17),
      point:             FieldSpan::new(17, 25),
      point_index:       FieldSpan::new(25, 26),
      point_code:        FieldSpan::new(26, 28),
      static_correction: FieldSpan::new(28, 32),
      point_depth:       FieldSpan::new(32, 36),
      datum:             FieldSpan::new(36, 40),
      uphole_time:       FieldSpan::new(40, 42),
      water_depth:       FieldSpan::new(42, 46),
      easting:           FieldSpan::new(46, 55),
      northing:          FieldSpan::new(55, 65),
      elevation:         FieldSpan::new(65, 71),
      julian_day:        FieldSpan::new(71, 74),
      hour:              FieldSpan::new(74, 76),
      minute:            FieldSpan::new(76, 78),
      second:            FieldSpan::new(78, 80),
      microsecond:       FieldSpan::default(),
    }
  }

  /// SPS revision 2.1 — wider coordinate columns plus millisecond digits.
  pub fn rev_2_1() -> Self {
    Self {
      name:              "Rev2.1".to_string(),
      record:            FieldSpan::new(1, 2),
      line:              FieldSpan::new(2, 11),
      point:             FieldSpan::new(12, 21),
      point_index:       FieldSpan::new(23, 24),
      point_code:        FieldSpan::new(25, 26),
      static_correction: FieldSpan::new(27, 30),
      point_depth:       FieldSpan::new(31, 34),
      datum:             FieldSpan::new(35, 38),
      uphole_time:       FieldSpan::new(39, 40),
      water_depth:       FieldSpan::new(41, 46),
      easting:           FieldSpan::new(47, 55),
      northing:          FieldSpan::new(56, 65),
      elevation:         FieldSpan::new(66, 71),
      julian_day:        FieldSpan::new(72, 74),
      hour:              FieldSpan::new(75, 76),
      minute:            FieldSpan::new(77, 78),
      second:            FieldSpan::new(79, 80),
      microsecond:       FieldSpan::new(81, 88),
    }
  }

  /// All spans with their field names, for validation and diagnostics.
  pub fn spans(&self) -> [(&'static str, FieldSpan); 18] {
    [
      ("record", self.record),
      ("line", self.line),
      ("point", self.point),
      ("point_index", self.point_index),
      ("point_code", self.point_code),
      ("static_correction", self.static_correction),
      ("point_depth", self.point_depth),
      ("datum", self.datum),
      ("uphole_time", self.uphole_time),
      ("water_depth", self.water_depth),
      ("easting", self.easting),
      ("northing", self.northing),
      ("elevation", self.elevation),
      ("julian_day", self.julian_day),
      ("hour", self.hour),
      ("minute", self.minute),
      ("second", self.second),
      ("microsecond", self.microsecond),
    ]
  }

  /// Reject any span whose end precedes its start.
  pub fn validate(&self) -> Result<()> {
    for (field, span) in self.spans() {
      if span.end < span.start {
        return Err(Error::InvalidSpan { field, start: span.start, end: span.end });
      }
    }
    Ok(())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
