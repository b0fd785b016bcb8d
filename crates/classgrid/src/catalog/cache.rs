//! In-memory course catalog, warmed once at startup.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use tracing::info;

use super::CatalogClient;
use crate::error::LookupError;
use crate::types::{Course, CourseResult, Section};

/// Default cap on search hits.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Thread-safe catalog held in RAM.
///
/// Courses stay in insertion order so search results are stable; sections are
/// keyed by course id for direct lookup.
pub struct CourseCatalog {
    courses: RwLock<Vec<Course>>,
    sections: DashMap<String, Vec<Section>>,
    search_limit: usize,
}

impl CourseCatalog {
    pub fn new(search_limit: usize) -> Self {
        Self {
            courses: RwLock::new(Vec::new()),
            sections: DashMap::new(),
            search_limit,
        }
    }

    /// Creates a catalog preloaded with `courses` and their `sections`.
    pub fn with_data(courses: Vec<Course>, sections: Vec<Section>) -> Self {
        let catalog = Self::default();
        catalog.replace(courses, sections);
        catalog
    }

    /// Swaps in a complete new data set.
    pub fn replace(&self, courses: Vec<Course>, sections: Vec<Section>) {
        let course_count = courses.len();
        let section_count = sections.len();

        self.sections.clear();
        for section in sections {
            self.sections
                .entry(section.course_id.clone())
                .or_default()
                .push(section);
        }

        *self.courses.write().unwrap_or_else(PoisonError::into_inner) = courses;

        info!(
            courses = course_count,
            sections = section_count,
            "Course catalog loaded"
        );
    }

    /// Case-insensitive substring match on course id or title, capped at the search limit.
    pub fn search(&self, query: &str) -> Vec<CourseResult> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let courses = self.courses.read().unwrap_or_else(PoisonError::into_inner);
        courses
            .iter()
            .filter(|c| {
                c.id.to_lowercase().contains(&query) || c.title.to_lowercase().contains(&query)
            })
            .take(self.search_limit)
            .map(Course::result)
            .collect()
    }

    pub fn sections(&self, course_id: &str) -> Vec<Section> {
        self.sections
            .get(course_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

}

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_LIMIT)
    }
}

#[async_trait]
impl CatalogClient for CourseCatalog {
    async fn search_courses(&self, query: &str) -> Result<Vec<CourseResult>, LookupError> {
        Ok(self.search(query))
    }

    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>, LookupError> {
        Ok(self.sections(course_id))
    }

    fn stats(&self) -> Option<CatalogStats> {
        Some(CatalogStats {
            courses: self
                .courses
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            courses_with_sections: self.sections.len(),
            sections: self.sections.iter().map(|e| e.value().len()).sum(),
        })
    }
}

/// Catalog size, reported by `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub courses: usize,
    pub courses_with_sections: usize,
    pub sections: usize,
}
