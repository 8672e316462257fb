//! Record decoding — one raw fixed-width line in, one [`DecodedPoint`] out.
//!
//! Pipeline:
//!   raw &str
//!     └─ slice each schema span          (extract.rs)
//!          └─ parse with defaults        (extract.rs)
//!               └─ encode composite keys (navdb_core::keys)
//!                    └─ DecodedPoint

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use navdb_core::{
  geometry::{DigitMask, KeyScalars},
  keys,
  point::DecodedPoint,
  revision::RevisionSchema,
};

use crate::{
  error::{Error, Result},
  extract,
};

// ─── Defaults ────────────────────────────────────────────────────────────────

/// Fallback values applied when a field is blank or unparsable. `None`
/// means "drop this field": optional fields stay empty, and a required
/// field (line, point) fails the record instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldDefaults {
  pub integer: Option<i64>,
  pub float:   Option<f64>,
}

// ─── DecodeContext ───────────────────────────────────────────────────────────

/// Everything [`decode_record`] needs besides the record itself. Built once
/// per import run; construction performs all configuration validation, so a
/// misconfigured schema or mask fails before any record is read.
#[derive(Debug, Clone)]
pub struct DecodeContext<'a> {
  schema:  &'a RevisionSchema,
  scalars: KeyScalars,

  pub tier:         i64,
  pub line_bearing: f64,
  pub year:         i32,
  pub defaults:     FieldDefaults,

  /// When set, the line field is a composite sail-line sliced into
  /// line/attempt/sequence by this mask's letter positions (source shots).
  /// Key encoding always uses the grid mask's scalars.
  pub sail_mask: Option<&'a DigitMask>,
}

impl<'a> DecodeContext<'a> {
  pub fn new(
    schema:       &'a RevisionSchema,
    mask:         &DigitMask,
    tier:         i64,
    line_bearing: f64,
  ) -> navdb_core::Result<Self> {
    schema.validate()?;
    let scalars = KeyScalars::from_mask(mask)?;
    if tier < 1 {
      return Err(navdb_core::Error::InvalidTier(tier));
    }
    Ok(Self {
      schema,
      scalars,
      tier,
      line_bearing,
      year: Utc::now().year(),
      defaults: FieldDefaults::default(),
      sail_mask: None,
    })
  }

  pub fn with_year(mut self, year: i32) -> Self {
    self.year = year;
    self
  }

  pub fn with_defaults(mut self, defaults: FieldDefaults) -> Self {
    self.defaults = defaults;
    self
  }

  pub fn with_sail_mask(mut self, mask: Option<&'a DigitMask>) -> Self {
    self.sail_mask = mask;
    self
  }

  pub fn scalars(&self) -> &KeyScalars { &self.scalars }
}

// ─── Header detection ────────────────────────────────────────────────────────

/// True when the record's first non-blank character is the header/comment
/// marker. Header records never reach [`decode_record`].
pub fn is_header(record: &str, marker: char) -> bool {
  record.trim_start().starts_with(marker)
}

// ─── Sail-line decomposition ─────────────────────────────────────────────────

/// The pieces of a composite sail-line field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SailLine {
  pub line:     Option<i64>,
  /// Attempt letter, uppercased; `"X"` when the column is blank.
  pub attempt:  String,
  pub sequence: Option<i64>,
}

/// Split a raw sail-line field by the letter positions of `mask`
/// (e.g. `"LLLLXSSSS"`: four line digits, one attempt letter, four
/// sequence digits).
pub fn split_sail_line(
  raw:     &str,
  mask:    &DigitMask,
  default: Option<i64>,
) -> SailLine {
  let field = raw.trim();

  let line = mask
    .span_of('L')
    .and_then(|span| extract::parse_int(extract::slice(field, span), default));

  let attempt = mask
    .span_of('X')
    .map(|span| extract::text(field, span))
    .and_then(|s| s.chars().next())
    .map(|c| c.to_ascii_uppercase().to_string())
    .unwrap_or_else(|| "X".to_string());

  let sequence = mask
    .span_of('S')
    .and_then(|span| extract::parse_int(extract::slice(field, span), default));

  SailLine { line, attempt, sequence }
}

// ─── Record decoding ─────────────────────────────────────────────────────────

/// Decode one data record. Pure function of its inputs.
///
/// Line and point are required (after defaults); a blank point-index column
/// decodes as 1. Coordinate and depth fields fall back to the configured
/// float default, then 0.0. Any failure condemns only this record.
pub fn decode_record(
  record: &str,
  ctx:    &DecodeContext,
) -> Result<DecodedPoint> {
  let schema = ctx.schema;
  let defaults = ctx.defaults;

  let (line, attempt, sequence) = if let Some(sail_mask) = ctx.sail_mask {
    let sail = split_sail_line(
      extract::slice(record, schema.line),
      sail_mask,
      defaults.integer,
    );
    let line = sail.line.ok_or(Error::MissingField("line"))?;
    (line, Some(sail.attempt), sail.sequence)
  } else {
    let line =
      extract::parse_int(extract::slice(record, schema.line), defaults.integer)
        .ok_or(Error::MissingField("line"))?;
    (line, None, None)
  };

  let point =
    extract::parse_int(extract::slice(record, schema.point), defaults.integer)
      .ok_or(Error::MissingField("point"))?;

  let point_index = match extract::parse_int(
    extract::slice(record, schema.point_index),
    defaults.integer,
  ) {
    Some(v) if v >= 1 => v,
    _ => 1,
  };

  let float_field = |span| {
    extract::parse_float(extract::slice(record, span), defaults.float)
      .unwrap_or(0.0)
  };

  let keys = keys::encode(ctx.tier, line, point, point_index, &ctx.scalars)?;

  Ok(DecodedPoint {
    tier: ctx.tier,
    line,
    point,
    point_index,
    point_code: extract::text(record, schema.point_code).to_string(),
    easting: float_field(schema.easting),
    northing: float_field(schema.northing),
    elevation: float_field(schema.elevation),
    water_depth: float_field(schema.water_depth),
    attempt,
    sequence,
    acquired_at: compose_timestamp(record, schema, ctx.year),
    line_bearing: ctx.line_bearing,
    keys,
    line_fk: None,
  })
}

/// Acquisition time from the record's Julian-day/time columns. Any missing
/// or out-of-range part yields `None` — time is informational, never a
/// reason to reject a record.
fn compose_timestamp(
  record: &str,
  schema: &RevisionSchema,
  year:   i32,
) -> Option<NaiveDateTime> {
  let part = |span| extract::parse_int(extract::slice(record, span), None);

  let ordinal = u32::try_from(part(schema.julian_day)?).ok()?;
  let date = NaiveDate::from_yo_opt(year, ordinal)?;

  let hour = u32::try_from(part(schema.hour).unwrap_or(0)).ok()?;
  let minute = u32::try_from(part(schema.minute).unwrap_or(0)).ok()?;
  let second = u32::try_from(part(schema.second).unwrap_or(0)).ok()?;
  let micro = u32::try_from(part(schema.microsecond).unwrap_or(0)).ok()?;

  date.and_hms_micro_opt(hour, minute, second, micro)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
