//! `lectern-core`: ids, lifecycle states, timestamps and configuration
//! shared by every lectern crate.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::{CoreError, Result};
