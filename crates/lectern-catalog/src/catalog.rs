//! Public, read-only view of the catalog: only published programs that
//! already have published lessons, and only those lessons.

use std::collections::BTreeMap;

use lectern_core::types::ProgramId;
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{row_to_lesson, row_to_program, LESSON_COLUMNS, PROGRAM_COLUMNS},
    editor::CatalogStore,
    error::{CatalogError, Result},
    types::{CatalogLesson, CatalogProgram, CatalogProgramDetail, CatalogTerm, Lesson, Program},
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
const FALLBACK_LANGUAGE: &str = "en";

impl CatalogStore {
    /// Published programs with at least one published lesson, most recently
    /// updated first. `language` filters on the program's primary language.
    pub fn catalog_programs(
        &self,
        language: Option<&str>,
        limit: u32,
    ) -> Result<Vec<CatalogProgram>> {
        let sql = format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs p
             WHERE p.status = 'published'
               AND (?1 IS NULL OR p.language_primary = ?1)
               AND EXISTS (
                   SELECT 1 FROM terms t JOIN lessons l ON l.term_id = t.id
                   WHERE t.program_id = p.id AND l.status = 'published')
             ORDER BY p.updated_at DESC, p.id
             LIMIT ?2"
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let programs = stmt
            .query_map(params![language, limit], row_to_program)?
            .map(|r| r.map(to_catalog_program))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(programs)
    }

    /// A published program with only its published lessons, video URLs
    /// resolved for `language`.
    pub fn catalog_program_detail(
        &self,
        id: &ProgramId,
        language: &str,
    ) -> Result<CatalogProgramDetail> {
        let sql = format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?1 AND status = 'published'"
        );
        let program = self
            .connection()
            .query_row(&sql, [id.as_str()], row_to_program)
            .optional()?
            .ok_or_else(|| CatalogError::not_found("program", id))?;

        // Prefix lesson columns so the join does not make them ambiguous.
        let lesson_columns = LESSON_COLUMNS
            .split(", ")
            .map(|c| format!("l.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {lesson_columns}, t.title, t.term_number
             FROM terms t JOIN lessons l ON l.term_id = t.id
             WHERE t.program_id = ?1 AND l.status = 'published'
             ORDER BY t.term_number, l.lesson_number"
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt.query_map([id.as_str()], |row| {
            // Term columns trail the 13 lesson columns.
            let lesson = row_to_lesson(row)?;
            let title: String = row.get(13)?;
            let number: u32 = row.get(14)?;
            Ok((number, title, lesson))
        })?;

        let mut terms: BTreeMap<u32, CatalogTerm> = BTreeMap::new();
        for row in rows {
            let (number, title, lesson) = row?;
            terms
                .entry(number)
                .or_insert_with(|| CatalogTerm {
                    title,
                    term_number: number,
                    lessons: Vec::new(),
                })
                .lessons
                .push(to_catalog_lesson(&lesson, language));
        }

        Ok(CatalogProgramDetail {
            program: to_catalog_program(program),
            terms: terms.into_values().collect(),
        })
    }
}

fn to_catalog_program(p: Program) -> CatalogProgram {
    CatalogProgram {
        id: p.id,
        title: p.title,
        description: p.description,
        language_primary: p.language_primary,
    }
}

/// Pick the lesson's URL for `language`, falling back to English and then
/// to any available language.
pub fn to_catalog_lesson(lesson: &Lesson, language: &str) -> CatalogLesson {
    let video_url = lesson
        .content_urls
        .get(language)
        .or_else(|| lesson.content_urls.get(FALLBACK_LANGUAGE))
        .or_else(|| lesson.content_urls.values().next())
        .cloned();
    CatalogLesson {
        id: lesson.id.clone(),
        title: lesson.title.clone(),
        duration_secs: lesson.duration_ms.map(|ms| ms / 1000),
        video_url,
    }
}
