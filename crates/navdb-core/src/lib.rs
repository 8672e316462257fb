//! Core types and trait definitions for the navdb positioning store.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod point;
pub mod policy;
pub mod revision;
pub mod store;

pub use error::{Error, Result};
