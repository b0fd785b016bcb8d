/// SQLite storage for the course catalog and saved schedules

mod schedules;
mod types;

pub use schedules::SqliteScheduleStore;
pub use types::{DbMeeting, DbSection};

use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::catalog::BannerImport;
use crate::error::StoreError;
use crate::types::{Course, Section};

const SCHEMA_SQL: &str = include_str!("../../sql/init.sql");

/// Opens `db_path` (or `:memory:`) and makes sure the schema exists.
pub(crate) fn open_connection(db_path: &str) -> Result<Connection, StoreError> {
    let conn = if db_path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(db_path)?
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}

pub(crate) fn lock_conn(db: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CatalogDb {
    db: Mutex<Connection>,
}

impl CatalogDb {
    /// Opens the catalog database and initializes the schema
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = open_connection(db_path)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Checks if the catalog holds any courses yet
    pub fn has_data(&self) -> Result<bool, StoreError> {
        let db = lock_conn(&self.db);
        let count: i64 = db.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Writes a whole import run in one transaction.
    pub fn insert_import(&self, import: &BannerImport) -> Result<(), StoreError> {
        let grouped = import.sections_by_course();
        for course in &import.courses {
            let sections = grouped.get(course.id.as_str()).cloned().unwrap_or_default();
            self.insert_course_with_sections(course, &sections)?;
        }
        info!(
            courses = import.courses.len(),
            sections = import.sections.len(),
            "Catalog import stored"
        );
        Ok(())
    }

    /// Upserts a course and replaces the meetings of each given section
    pub fn insert_course_with_sections(
        &self,
        course: &Course,
        sections: &[&Section],
    ) -> Result<(), StoreError> {
        let mut db = lock_conn(&self.db);
        let tx = db.transaction()?;

        tx.execute(
            "INSERT INTO courses (course_id, department, code, title, description, credits, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
             ON CONFLICT(course_id) DO UPDATE SET
                department = excluded.department,
                code = excluded.code,
                title = excluded.title,
                description = excluded.description,
                credits = excluded.credits",
            (
                &course.id,
                &course.department,
                &course.code,
                &course.title,
                &course.description,
                course.credits,
            ),
        )?;

        for section in sections {
            tx.execute(
                "INSERT INTO sections (section_id, course_id, section_label, professor, created_at)
                 VALUES (?1, ?2, ?3, ?4, datetime('now'))
                 ON CONFLICT(section_id) DO UPDATE SET
                    course_id = excluded.course_id,
                    section_label = excluded.section_label,
                    professor = excluded.professor",
                (
                    &section.id,
                    &section.course_id,
                    &section.section_label,
                    &section.professor,
                ),
            )?;

            tx.execute("DELETE FROM meetings WHERE section_id = ?", [&section.id])?;
            for (position, meeting) in section.meetings.iter().enumerate() {
                tx.execute(
                    "INSERT INTO meetings (section_id, position, day, start_minute, end_minute, location)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (
                        &section.id,
                        position as i64,
                        meeting.day,
                        meeting.start_minute,
                        meeting.end_minute,
                        &meeting.location,
                    ),
                )?;
            }
        }

        tx.commit()?;
        debug!(course_id = %course.id, sections = sections.len(), "Course stored");
        Ok(())
    }

    /// Loads every course and section, meetings attached, for warming the in-memory catalog
    pub fn load_all(&self) -> Result<(Vec<Course>, Vec<Section>), StoreError> {
        let db = lock_conn(&self.db);

        let mut course_stmt = db.prepare(
            "SELECT course_id, department, code, title, description, credits
             FROM courses ORDER BY course_id",
        )?;
        let courses = course_stmt
            .query_map([], row_to_course)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut meeting_stmt = db.prepare(
            "SELECT section_id, day, start_minute, end_minute, location
             FROM meetings ORDER BY section_id, position",
        )?;
        let mut meetings: HashMap<String, Vec<DbMeeting>> = HashMap::new();
        for meeting in meeting_stmt.query_map([], row_to_meeting)? {
            let meeting = meeting?;
            meetings.entry(meeting.section_id.clone()).or_default().push(meeting);
        }

        let mut section_stmt = db.prepare(
            "SELECT section_id, course_id, section_label, professor
             FROM sections ORDER BY course_id, section_label, section_id",
        )?;
        let sections = section_stmt
            .query_map([], |row| {
                Ok(DbSection {
                    section_id: row.get(0)?,
                    course_id: row.get(1)?,
                    section_label: row.get(2)?,
                    professor: row.get(3)?,
                })
            })?
            .map(|row| {
                row.map(|section| {
                    let section_meetings = meetings
                        .get(&section.section_id)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    section.into_section(section_meetings)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((courses, sections))
    }
}

fn row_to_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        department: row.get(1)?,
        code: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        credits: row.get(5)?,
    })
}

fn row_to_meeting(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbMeeting> {
    Ok(DbMeeting {
        section_id: row.get(0)?,
        day: row.get(1)?,
        start_minute: row.get(2)?,
        end_minute: row.get(3)?,
        location: row.get(4)?,
    })
}
