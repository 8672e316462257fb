//! Fixed-width SPS record decoder.
//!
//! Converts raw positioning records (one line of text per physical
//! observation) into [`navdb_core`] domain types, using the column layout of
//! a [`RevisionSchema`](navdb_core::revision::RevisionSchema) and the
//! digit-width mask of the project geometry. Pure synchronous; no I/O or
//! database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use navdb_core::{geometry::DigitMask, revision::RevisionSchema};
//! use navdb_sps::{DecodeContext, decode_record};
//!
//! let schema = RevisionSchema::rev_2_1();
//! let mask = DigitMask::new("LLLLPPPP").unwrap();
//! let ctx = DecodeContext::new(&schema, &mask, 1, 0.0).unwrap();
//! let point = decode_record("S  53271      28941 …", &ctx).unwrap();
//! println!("line {} point {}", point.line, point.point);
//! ```

pub mod error;

mod decode;
mod extract;

pub use decode::{
  DecodeContext, FieldDefaults, SailLine, decode_record, is_header,
  split_sail_line,
};
pub use error::{Error, Result};
