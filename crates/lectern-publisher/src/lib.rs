//! `lectern-publisher`: scheduled publication engine over the SQLite
//! content store.
//!
//! # Overview
//!
//! Each tick of [`engine::PublisherEngine`] runs one cycle:
//!
//! | Step       | Module         | Effect                                             |
//! |------------|----------------|----------------------------------------------------|
//! | Claim      | [`claim`]      | Lease up to `batch_size` due lessons, skipping rows other workers hold |
//! | Transition | [`transition`] | `scheduled → published`, stamping `published_at`   |
//! | Cascade    | [`cascade`]    | Publish the lesson's program if it is still a draft |
//!
//! Transition and cascade for one lesson share one `BEGIN IMMEDIATE`
//! transaction; lessons in a batch commit independently. Any number of
//! engine processes may run against one database file. All coordination
//! goes through the claim columns on `lessons`; the engine keeps no state
//! between ticks.

pub mod cascade;
pub mod claim;
pub mod engine;
pub mod error;
pub mod manual;
pub mod report;
pub mod transition;

pub use engine::PublisherEngine;
pub use error::{PublisherError, Result};
pub use report::{CascadeRecord, ItemFailure, TickReport};
