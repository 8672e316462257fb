//! Duplicate resolution — what happens when the same physical point is
//! observed more than once.
//!
//! The policy decides both the `point_index` assigned to a new occurrence
//! and the SQL strategy the store uses for the insert (plain insert,
//! insert-if-absent, or upsert). It is selected once per import run; an
//! unrecognised policy name is an error, never a default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  geometry::KeyScalars,
  keys,
  point::DecodedPoint,
};

/// `(tier, line, point)` — the identity a duplicate occurrence shares.
pub type NaturalKey = (i64, i64, i64);

// ─── DuplicatePolicy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
  /// Every re-observation becomes a new row with the next free index.
  Add,
  /// Index fixed at 1; an existing row wins and the new one is dropped.
  KeepFirst,
  /// Index fixed at 1; the new row overwrites an existing one.
  KeepLast,
}

impl DuplicatePolicy {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Add => "add",
      Self::KeepFirst => "keep_first",
      Self::KeepLast => "keep_last",
    }
  }
}

impl std::str::FromStr for DuplicatePolicy {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "add" => Ok(Self::Add),
      "keep_first" => Ok(Self::KeepFirst),
      "keep_last" => Ok(Self::KeepLast),
      other => Err(Error::UnknownPolicy(other.to_string())),
    }
  }
}

impl std::fmt::Display for DuplicatePolicy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Index assignment ────────────────────────────────────────────────────────

/// Resolve the final `point_index` of every point in a flush batch.
///
/// Under [`DuplicatePolicy::Add`], `base_max` must hold the highest index
/// already persisted per natural key (one batched store lookup per flush);
/// occurrences within the batch then continue counting from there, so a key
/// seen N times in total ends up with indices `1..=N` regardless of batch
/// boundaries. The other policies force index 1 and let the insert SQL
/// decide the conflict outcome.
///
/// The index-bearing composite keys are re-encoded after resolution so the
/// stored composites always agree with the stored index.
pub fn assign_indices(
  batch:    &mut [DecodedPoint],
  policy:   DuplicatePolicy,
  base_max: &HashMap<NaturalKey, i64>,
  scalars:  &KeyScalars,
) -> Result<()> {
  match policy {
    DuplicatePolicy::Add => {
      let mut added_in_batch: HashMap<NaturalKey, i64> = HashMap::new();
      for p in batch.iter_mut() {
        let key = p.natural_key();
        let start = base_max.get(&key).copied().unwrap_or(0);
        let inc = added_in_batch.entry(key).or_insert(0);
        *inc += 1;
        p.point_index = start + *inc;
        p.keys = keys::encode(p.tier, p.line, p.point, p.point_index, scalars)?;
      }
    }
    DuplicatePolicy::KeepFirst | DuplicatePolicy::KeepLast => {
      for p in batch.iter_mut() {
        if p.point_index != 1 {
          p.point_index = 1;
          p.keys =
            keys::encode(p.tier, p.line, p.point, p.point_index, scalars)?;
        }
      }
    }
  }
  Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
