//! Composite integer keys for the tier → line → point → index hierarchy.
//!
//! Each key packs two or more identifiers into one integer by shifting the
//! outer identifier left by a mask-derived power of ten. The digit layout is
//! fixed by the configured mask widths, not by the magnitude of the inputs:
//! an input that exceeds its reserved width produces colliding keys, which
//! is a documented limitation of the format rather than something corrected
//! here.

use crate::{Error, Result, geometry::KeyScalars};

/// The derived keys carried alongside every decoded point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeKeys {
  /// `line * point_scalar + point`
  pub line_point:            i64,
  /// `line_point * 10 + point_index`
  pub line_point_index:      i64,
  /// `tier * line_scalar + line`
  pub tier_line:             i64,
  /// `tier * line_point_scalar + line_point`
  pub tier_line_point:       i64,
  /// `tier * 10^(digits(line_point_index) + 1) + line_point_index`
  pub tier_line_point_index: i64,
}

/// Encode all composite keys for one observation.
///
/// The `tier_line_point_index` shift depends on the decimal digit count of
/// the *value* of `line_point_index`, which varies with line and point
/// magnitude within a single file, so it must be recomputed per record and
/// never hoisted as a constant.
pub fn encode(
  tier:        i64,
  line:        i64,
  point:       i64,
  point_index: i64,
  scalars:     &KeyScalars,
) -> Result<CompositeKeys> {
  let overflow = || Error::KeyOverflow { tier, line, point };

  let line_point = line
    .checked_mul(scalars.point)
    .and_then(|v| v.checked_add(point))
    .ok_or_else(overflow)?;

  let line_point_index = line_point
    .checked_mul(10)
    .and_then(|v| v.checked_add(point_index))
    .ok_or_else(overflow)?;

  let tier_line = tier
    .checked_mul(scalars.line)
    .and_then(|v| v.checked_add(line))
    .ok_or_else(overflow)?;

  let tier_line_point = tier
    .checked_mul(scalars.line_point)
    .and_then(|v| v.checked_add(line_point))
    .ok_or_else(overflow)?;

  let index_shift = 10i64
    .checked_pow(decimal_digits(line_point_index) + 1)
    .ok_or_else(overflow)?;
  let tier_line_point_index = tier
    .checked_mul(index_shift)
    .and_then(|v| v.checked_add(line_point_index))
    .ok_or_else(overflow)?;

  Ok(CompositeKeys {
    line_point,
    line_point_index,
    tier_line,
    tier_line_point,
    tier_line_point_index,
  })
}

fn decimal_digits(value: i64) -> u32 {
  match value.unsigned_abs().checked_ilog10() {
    Some(d) => d + 1,
    None => 1,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
