//! Immediate publication requested by an editor, outside the schedule.
//!
//! The engine never calls this. It shares the transition and cascade rules
//! with the engine so a program's status follows its lessons no matter how
//! they were published.

use chrono::{DateTime, Utc};
use lectern_catalog::{
    permissions::{Capability, PermissionChecker},
    CatalogError,
};
use lectern_core::types::{LessonId, Role};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

use crate::{
    cascade::{cascade, CascadeOutcome},
    error::Result,
    transition::{publish_unclaimed, PublishedUnit},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualPublish {
    pub unit: PublishedUnit,
    pub cascade: CascadeOutcome,
}

/// Publish a draft or scheduled lesson now, cascading to its program.
pub fn publish_now(
    conn: &mut Connection,
    actor: Role,
    id: &LessonId,
    now: DateTime<Utc>,
) -> Result<ManualPublish> {
    PermissionChecker::require(actor, Capability::PublishContent)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(unit) = publish_unclaimed(&tx, id, now)? else {
        let status: Option<String> = tx
            .query_row("SELECT status FROM lessons WHERE id = ?1", [id.as_str()], |r| {
                r.get(0)
            })
            .optional()?;
        return Err(match status {
            None => CatalogError::not_found("lesson", id).into(),
            Some(s) => CatalogError::InvalidTransition(format!(
                "lesson {id} is {s} and cannot be published again"
            ))
            .into(),
        });
    };
    let cascade = cascade(&tx, &unit, now)?;
    tx.commit()?;

    info!(
        lesson_id = %id,
        %actor,
        program_published = cascade.did_publish(),
        "lesson published manually"
    );
    Ok(ManualPublish { unit, cascade })
}
