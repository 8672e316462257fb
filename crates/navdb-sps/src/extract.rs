//! Low-level field extraction: span slicing and tolerant numeric parsing.
//!
//! Every helper is a pure function of its inputs. Offsets are byte offsets;
//! fixed-width positioning records are ASCII, and a span that lands inside a
//! multi-byte replacement character simply yields the empty string (and so
//! the caller's default).

use navdb_core::revision::FieldSpan;

/// Slice `record[start..end]`, clamped to the record; out of range yields
/// `""` rather than panicking.
pub(crate) fn slice(record: &str, span: FieldSpan) -> &str {
  let len = record.len();
  let start = span.start.min(len);
  let end = span.end.min(len).max(start);
  if record.is_char_boundary(start) && record.is_char_boundary(end) {
    &record[start..end]
  } else {
    ""
  }
}

/// Trimmed text field; `""` when absent, never null.
pub(crate) fn text(record: &str, span: FieldSpan) -> &str {
  slice(record, span).trim()
}

/// Parse an integer field. Numeric columns are sometimes right-padded with
/// a fraction (`"12.0"`), so a plain-integer failure falls back to parsing
/// as a float and truncating. Blank or unparsable yields `default`.
pub(crate) fn parse_int(raw: &str, default: Option<i64>) -> Option<i64> {
  let s = raw.trim();
  if s.is_empty() {
    return default;
  }
  if let Ok(v) = s.parse::<i64>() {
    return Some(v);
  }
  match s.parse::<f64>() {
    Ok(v) if v.is_finite() => Some(v.trunc() as i64),
    _ => default,
  }
}

/// Parse a float field, normalising a `,` decimal separator to `.`.
/// Blank or unparsable yields `default`.
pub(crate) fn parse_float(raw: &str, default: Option<f64>) -> Option<f64> {
  let s = raw.trim();
  if s.is_empty() {
    return default;
  }
  s.replace(',', ".").parse::<f64>().ok().or(default)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
