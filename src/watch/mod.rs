// src/watch/mod.rs

//! Query source watching.
//!
//! This module is responsible for:
//! - Noticing when a query file changes (by modification time, through the
//!   injected [`crate::fs::FileSystem`]).
//! - Owning the scheduled cache registered for each file and swapping it
//!   out (unregister old, register new) when the file changes.
//!
//! It does **not** decide when to check; the reconciliation loop in
//! [`crate::engine`] drives it.

pub mod source;

pub use source::QuerySource;
