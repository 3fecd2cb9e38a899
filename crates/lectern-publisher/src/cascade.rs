//! Upward propagation of `published` from a lesson to its program.
//!
//! The hierarchy is lesson → term → program and the cascade is a single
//! hop to the program: terms carry no status. It runs inside the lesson's
//! transaction, after the lesson write, so a program is never visible as
//! published before at least one of its lessons is.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use lectern_core::time::{format_ts, parse_ts};
use lectern_core::types::{ProgramId, ProgramStatus, TermId};
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::{
    error::{PublisherError, Result},
    transition::PublishedUnit,
};

/// The status-bearing slice of a program row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: ProgramId,
    pub status: ProgramStatus,
    pub published_at: Option<DateTime<Utc>>,
}

/// What the cascade did for one published lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// This lesson flipped its program to published.
    Published(ProgramId),
    /// The program was already published; nothing was written.
    AlreadyPublished(ProgramId),
}

impl CascadeOutcome {
    pub fn program_id(&self) -> &ProgramId {
        match self {
            CascadeOutcome::Published(id) | CascadeOutcome::AlreadyPublished(id) => id,
        }
    }

    pub fn did_publish(&self) -> bool {
        matches!(self, CascadeOutcome::Published(_))
    }
}

/// Parent of the term: the lesson's program, two levels up.
pub fn resolve_container(tx: &Transaction<'_>, term_id: &TermId) -> Result<Option<ProgramId>> {
    let id = tx
        .query_row(
            "SELECT program_id FROM terms WHERE id = ?1",
            [term_id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(id.map(ProgramId::from))
}

pub fn get_container(tx: &Transaction<'_>, id: &ProgramId) -> Result<Option<Container>> {
    let row = tx
        .query_row(
            "SELECT status, published_at FROM programs WHERE id = ?1",
            [id.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    let Some((status, published_at)) = row else {
        return Ok(None);
    };
    let status = ProgramStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Some(Container {
        id: id.clone(),
        status,
        published_at: published_at.as_deref().and_then(parse_ts),
    }))
}

/// Conditional forward transition. Returns whether this call changed the
/// row; a program that is already published is left untouched, including
/// its original `published_at`.
pub fn publish_container_if_unpublished(
    tx: &Transaction<'_>,
    id: &ProgramId,
    now: DateTime<Utc>,
) -> Result<bool> {
    let n = tx.execute(
        "UPDATE programs SET status = 'published', published_at = ?2, updated_at = ?2
         WHERE id = ?1 AND status <> 'published'",
        params![id.as_str(), format_ts(now)],
    )?;
    Ok(n == 1)
}

/// Publish the program above `unit` if it is not published yet, stamping
/// it with the same `now` as the lesson.
///
/// A term or program that cannot be found is a data integrity error; the
/// caller rolls back the lesson with it.
pub fn cascade(
    tx: &Transaction<'_>,
    unit: &PublishedUnit,
    now: DateTime<Utc>,
) -> Result<CascadeOutcome> {
    let program_id =
        resolve_container(tx, &unit.term_id)?.ok_or_else(|| PublisherError::DanglingParent {
            lesson_id: unit.id.clone(),
            missing: "term",
            id: unit.term_id.to_string(),
        })?;

    let container = get_container(tx, &program_id)?.ok_or_else(|| {
        PublisherError::DanglingParent {
            lesson_id: unit.id.clone(),
            missing: "program",
            id: program_id.to_string(),
        }
    })?;

    if container.status == ProgramStatus::Published {
        debug!(program_id = %program_id, lesson_id = %unit.id, "program already published");
        return Ok(CascadeOutcome::AlreadyPublished(program_id));
    }

    // The read above can be stale if another writer got in between; the
    // conditional UPDATE is the real arbiter.
    if publish_container_if_unpublished(tx, &program_id, now)? {
        info!(program_id = %program_id, lesson_id = %unit.id, "program auto-published");
        Ok(CascadeOutcome::Published(program_id))
    } else {
        Ok(CascadeOutcome::AlreadyPublished(program_id))
    }
}
