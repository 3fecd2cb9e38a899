//! `lectern-catalog`: the content store behind lectern.
//!
//! Owns the SQLite schema for programs, terms and lessons, the editorial
//! operations that move lessons into `scheduled`, the public catalog reads,
//! and role-based capability checks. Publication itself lives in
//! `lectern-publisher`.

pub mod catalog;
pub mod db;
pub mod editor;
pub mod error;
pub mod permissions;
pub mod seed;
pub mod types;

pub use editor::CatalogStore;
pub use error::{CatalogError, Result};
pub use permissions::{Capability, PermissionCheck, PermissionChecker};
pub use types::{Lesson, NewLesson, Program, ProgramDetail, Term, TermWithLessons};
