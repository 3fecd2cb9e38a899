use chrono::{DateTime, Utc};
use lectern_core::time::format_ts;
use lectern_core::types::{LessonId, LessonStatus, ProgramId, Role, TermId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::{
    db::{
        init_db, row_to_lesson, row_to_program, row_to_term, LESSON_COLUMNS, PROGRAM_COLUMNS,
        TERM_COLUMNS,
    },
    error::{CatalogError, Result},
    permissions::{Capability, PermissionChecker},
    types::{Lesson, NewLesson, Program, ProgramDetail, Term, TermWithLessons},
};

/// Editorial access to the catalog.
///
/// Every mutating call takes the acting [`Role`] and checks it before
/// touching the store. Program status is never written here; it follows its
/// lessons through the publication cascade.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Wrap `conn`, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    pub fn create_program(
        &self,
        actor: Role,
        title: &str,
        description: Option<&str>,
        language_primary: &str,
    ) -> Result<Program> {
        PermissionChecker::require(actor, Capability::EditContent)?;
        let id = ProgramId::new();
        let now = format_ts(Utc::now());
        self.conn.execute(
            "INSERT INTO programs
             (id, title, description, language_primary, status, published_at,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'draft', NULL, ?5, ?5)",
            params![id.as_str(), title, description, language_primary, now],
        )?;
        info!(program_id = %id, %title, "program created");
        self.program(&id)
    }

    /// Append a term to `program_id`, numbered after the current last term.
    pub fn create_term(&self, actor: Role, program_id: &ProgramId, title: &str) -> Result<Term> {
        PermissionChecker::require(actor, Capability::EditContent)?;
        // Existence check first so a bad parent is NotFound, not a constraint error.
        self.program(program_id)?;

        let id = TermId::new();
        let now = format_ts(Utc::now());
        self.conn.execute(
            "INSERT INTO terms (id, program_id, term_number, title, created_at, updated_at)
             SELECT ?1, ?2, COALESCE(MAX(term_number), 0) + 1, ?3, ?4, ?4
             FROM terms WHERE program_id = ?2",
            params![id.as_str(), program_id.as_str(), title, now],
        )?;
        info!(term_id = %id, program_id = %program_id, "term created");
        self.term(&id)
    }

    /// Append a draft lesson to `term_id`, numbered after the current last lesson.
    pub fn create_lesson(
        &self,
        actor: Role,
        term_id: &TermId,
        lesson: NewLesson,
    ) -> Result<Lesson> {
        PermissionChecker::require(actor, Capability::EditContent)?;
        self.term(term_id)?;

        let id = LessonId::new();
        let now = format_ts(Utc::now());
        let urls = serde_json::to_string(&lesson.content_urls)?;
        let content_type = lesson.content_type.as_deref().unwrap_or("article");
        self.conn.execute(
            "INSERT INTO lessons
             (id, term_id, lesson_number, title, content_type, duration_ms, is_paid,
              content_urls, status, created_at, updated_at)
             SELECT ?1, ?2, COALESCE(MAX(lesson_number), 0) + 1, ?3, ?4, ?5, ?6, ?7,
                    'draft', ?8, ?8
             FROM lessons WHERE term_id = ?2",
            params![
                id.as_str(),
                term_id.as_str(),
                lesson.title,
                content_type,
                lesson.duration_ms,
                lesson.is_paid,
                urls,
                now
            ],
        )?;
        info!(lesson_id = %id, term_id = %term_id, "lesson created");
        self.get_lesson(&id)
    }

    /// Move a draft or scheduled lesson to `scheduled` at `publish_at`.
    ///
    /// Rescheduling clears any outstanding publisher claim, so a worker that
    /// claimed the old schedule loses its claim instead of publishing early.
    pub fn schedule_lesson(
        &self,
        actor: Role,
        id: &LessonId,
        publish_at: DateTime<Utc>,
    ) -> Result<Lesson> {
        PermissionChecker::require(actor, Capability::ScheduleContent)?;
        let n = self.conn.execute(
            "UPDATE lessons
             SET status = 'scheduled', publish_at = ?2,
                 claimed_by = NULL, claim_expires_at = NULL, updated_at = ?3
             WHERE id = ?1 AND status IN ('draft', 'scheduled')",
            params![id.as_str(), format_ts(publish_at), format_ts(Utc::now())],
        )?;
        if n == 0 {
            let current = self.get_lesson(id)?;
            return Err(CatalogError::InvalidTransition(format!(
                "lesson {id} is {} and cannot be scheduled",
                current.status
            )));
        }
        info!(lesson_id = %id, publish_at = %format_ts(publish_at), "lesson scheduled");
        self.get_lesson(id)
    }

    pub fn delete_lesson(&self, actor: Role, id: &LessonId) -> Result<()> {
        PermissionChecker::require(actor, Capability::DeleteContent)?;
        let n = self
            .conn
            .execute("DELETE FROM lessons WHERE id = ?1", [id.as_str()])?;
        if n == 0 {
            return Err(CatalogError::not_found("lesson", id));
        }
        info!(lesson_id = %id, "lesson deleted");
        Ok(())
    }

    pub fn get_lesson(&self, id: &LessonId) -> Result<Lesson> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.as_str()], row_to_lesson)
            .optional()?
            .ok_or_else(|| CatalogError::not_found("lesson", id))
    }

    /// Load a program with its terms and lessons, both in number order.
    pub fn get_program(&self, id: &ProgramId) -> Result<ProgramDetail> {
        let program = self.program(id)?;

        let term_sql =
            format!("SELECT {TERM_COLUMNS} FROM terms WHERE program_id = ?1 ORDER BY term_number");
        let terms: Vec<Term> = {
            let mut stmt = self.conn.prepare(&term_sql)?;
            let rows = stmt.query_map([id.as_str()], row_to_term)?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let lesson_sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE term_id = ?1 ORDER BY lesson_number"
        );
        let mut stmt = self.conn.prepare(&lesson_sql)?;
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            let lessons = stmt
                .query_map([term.id.as_str()], row_to_lesson)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(TermWithLessons { term, lessons });
        }

        Ok(ProgramDetail {
            program,
            terms: out,
        })
    }

    /// All programs, newest first.
    pub fn list_programs(&self) -> Result<Vec<Program>> {
        let sql = format!("SELECT {PROGRAM_COLUMNS} FROM programs ORDER BY created_at DESC, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let programs = stmt
            .query_map([], row_to_program)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(programs)
    }

    /// Count lessons of `status`, across the whole catalog.
    pub fn count_lessons(&self, status: LessonStatus) -> Result<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM lessons WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    // --- private helpers ---------------------------------------------------

    fn program(&self, id: &ProgramId) -> Result<Program> {
        let sql = format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.as_str()], row_to_program)
            .optional()?
            .ok_or_else(|| CatalogError::not_found("program", id))
    }

    fn term(&self, id: &TermId) -> Result<Term> {
        let sql = format!("SELECT {TERM_COLUMNS} FROM terms WHERE id = ?1");
        self.conn
            .query_row(&sql, [id.as_str()], row_to_term)
            .optional()?
            .ok_or_else(|| CatalogError::not_found("term", id))
    }
}
