//! Digit-width masks and the decimal scalars derived from them.
//!
//! A project reserves a fixed number of decimal digits for each axis of the
//! position hierarchy with a mask string such as `"LLLLPPPP"` (line digits,
//! point digits) or `"LLLLXSSSS"` (line, attempt, sequence — the sail-line
//! layout used for source shots). The composite keys in [`crate::keys`] are
//! built from scalars of the form `10^(digits + 1)` derived here.
//!
//! A mask that lacks the letter an axis needs cannot encode that axis; every
//! scalar accessor returns an error in that case instead of a degenerate
//! scalar that would silently alias keys across lines.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, point::PointKind, revision::FieldSpan};

const MASK_ALPHABET: &str = "LPXS";

// Widest digit reservation that still leaves room for the tier digits in an
// i64 composite key.
const MAX_AXIS_DIGITS: usize = 15;

// ─── DigitMask ───────────────────────────────────────────────────────────────

/// A validated digit-width mask over the alphabet `L`, `P`, `X`, `S`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DigitMask(String);

impl DigitMask {
  pub fn new(mask: impl Into<String>) -> Result<Self> {
    let mask = mask.into();
    if mask.is_empty() || mask.chars().any(|c| !MASK_ALPHABET.contains(c)) {
      return Err(Error::InvalidMask(mask));
    }
    for letter in MASK_ALPHABET.chars() {
      if mask.chars().filter(|&c| c == letter).count() > MAX_AXIS_DIGITS {
        return Err(Error::MaskTooWide(mask));
      }
    }
    Ok(Self(mask))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  // ── Digit counts ──────────────────────────────────────────────────────

  pub fn line_digits(&self) -> usize { self.count('L') }

  pub fn point_digits(&self) -> usize { self.count('P') }

  pub fn attempt_digits(&self) -> usize { self.count('X') }

  pub fn sequence_digits(&self) -> usize { self.count('S') }

  fn count(&self, letter: char) -> usize {
    self.0.chars().filter(|&c| c == letter).count()
  }

  // ── Scalars ───────────────────────────────────────────────────────────

  /// `10^(point digits + 1)` — shifts a line number above its points.
  pub fn point_scalar(&self) -> Result<i64> {
    self.scalar('P', "point", 1)
  }

  /// `10^(line digits + 1)` — shifts a tier above its lines.
  pub fn line_scalar(&self) -> Result<i64> {
    self.scalar('L', "line", 1)
  }

  /// `10^(line digits + 1)` — shifts a tier above a line-point composite.
  pub fn line_point_scalar(&self) -> Result<i64> {
    self.scalar('L', "line", 1)
  }

  /// `10^(attempt digits)` — the sail-line attempt axis.
  pub fn attempt_scalar(&self) -> Result<i64> {
    self.scalar('X', "attempt", 0)
  }

  fn scalar(&self, letter: char, axis: &'static str, extra: u32) -> Result<i64> {
    let digits = self.count(letter);
    if digits == 0 {
      return Err(Error::MaskMissingAxis { mask: self.0.clone(), axis });
    }
    // Counts are capped at MAX_AXIS_DIGITS, so the power cannot overflow.
    Ok(10i64.pow(digits as u32 + extra))
  }

  // ── Letter spans ──────────────────────────────────────────────────────

  /// The `[first, last+1)` span covered by `letter`, for slicing composite
  /// sail-line fields. `None` when the letter does not occur.
  pub fn span_of(&self, letter: char) -> Option<FieldSpan> {
    let first = self.0.find(letter)?;
    let last = self.0.rfind(letter)?;
    Some(FieldSpan::new(first, last + 1))
  }
}

impl TryFrom<String> for DigitMask {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::new(value) }
}

impl From<DigitMask> for String {
  fn from(mask: DigitMask) -> Self { mask.0 }
}

impl std::fmt::Display for DigitMask {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── KeyScalars ──────────────────────────────────────────────────────────────

/// The scalars the key encoder needs, pre-validated so every value is `> 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyScalars {
  pub point:      i64,
  pub line:       i64,
  pub line_point: i64,
}

impl KeyScalars {
  pub fn from_mask(mask: &DigitMask) -> Result<Self> {
    Ok(Self {
      point:      mask.point_scalar()?,
      line:       mask.line_scalar()?,
      line_point: mask.line_point_scalar()?,
    })
  }
}

// ─── GeometryConfig ──────────────────────────────────────────────────────────

/// Per-project digit masks.
///
/// `receiver_mask` and `source_mask` are the L/P grid masks that drive key
/// encoding; both must reserve line and point digits. `sail_line_mask` is
/// the L/X/S layout of the composite sail-line field on source records —
/// it only governs how that field is split, never how keys are encoded.
/// QC fixes share the receiver grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryConfig {
  #[serde(default = "default_grid_mask")]
  pub receiver_mask:  DigitMask,
  #[serde(default = "default_grid_mask")]
  pub source_mask:    DigitMask,
  #[serde(default = "default_sail_line_mask")]
  pub sail_line_mask: Option<DigitMask>,
}

fn default_grid_mask() -> DigitMask {
  DigitMask::new("LLLLPPPP").expect("default mask is valid")
}

fn default_sail_line_mask() -> Option<DigitMask> {
  Some(DigitMask::new("LLLLXSSSS").expect("default mask is valid"))
}

impl Default for GeometryConfig {
  fn default() -> Self {
    Self {
      receiver_mask:  default_grid_mask(),
      source_mask:    default_grid_mask(),
      sail_line_mask: default_sail_line_mask(),
    }
  }
}

impl GeometryConfig {
  pub fn mask_for(&self, kind: PointKind) -> &DigitMask {
    match kind {
      PointKind::Receiver | PointKind::QcFix => &self.receiver_mask,
      PointKind::Source => &self.source_mask,
    }
  }

  /// The sail-line split mask, applicable to source records only.
  pub fn sail_line_mask_for(&self, kind: PointKind) -> Option<&DigitMask> {
    match kind {
      PointKind::Source => self.sail_line_mask.as_ref(),
      PointKind::Receiver | PointKind::QcFix => None,
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
