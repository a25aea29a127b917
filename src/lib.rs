//! `university-records` - The enrollment core of a university records system
//!
//! This crate decides whether a student may register for a course, runs the enrollment
//! state machine, keeps the prerequisite graph acyclic, serializes exclusive work on a
//! student record, and keeps derived read caches consistent with committed writes.

#![deny(
    unsafe_code,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
#![warn(
    // Entity derives generate undocumented items, so this stays a warning
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Store handles and caches are shared through Arc
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::todo,
    clippy::too_many_lines,
    clippy::wildcard_imports,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions, // `student::StudentRecord` and friends
    clippy::missing_errors_doc,      // error variants are listed where they are not obvious
)]

/// Derived read caches with explicit invalidation
pub mod cache;
/// Configuration management for database, settings and catalog seeding
pub mod config;
/// Core business logic - students, courses, prerequisites, enrollments and locking
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Application façade bundling connection, cache, locks and settings
pub mod registry;

pub use errors::{Error, ErrorKind, Result};
pub use registry::Registry;

#[cfg(test)]
pub mod test_utils;
