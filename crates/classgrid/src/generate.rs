//! Conflict-free schedule generation: one section per requested course.

use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::error::GenerateError;
use crate::schedule::Schedule;
use crate::types::Section;

/// Most courses a single generation request may combine
pub const MAX_COURSES: usize = 7;

/// Default cap on returned schedules
pub const DEFAULT_RESULT_LIMIT: usize = 200;

/// Loads sections for each course and returns every combination without a
/// time overlap, up to `limit` schedules.
///
/// Duplicate course ids are requested once. A course with no sections makes
/// every combination impossible, so the result is empty.
pub async fn generate_schedules(
    catalog: &dyn CatalogClient,
    course_ids: &[String],
    limit: usize,
) -> Result<Vec<Schedule>, GenerateError> {
    let mut unique: Vec<&str> = Vec::with_capacity(course_ids.len());
    for id in course_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }

    if unique.len() > MAX_COURSES {
        return Err(GenerateError::TooManyCourses {
            count: unique.len(),
            max: MAX_COURSES,
        });
    }

    let mut buckets = Vec::with_capacity(unique.len());
    for course_id in &unique {
        let sections = catalog
            .sections_for_course(course_id)
            .await
            .map_err(|source| GenerateError::Lookup {
                course_id: course_id.to_string(),
                source,
            })?;
        if sections.is_empty() {
            warn!(course_id = %course_id, "Course has no sections, nothing to generate");
        }
        buckets.push(sections);
    }

    let schedules = combinations(&buckets, limit);
    info!(
        courses = unique.len(),
        schedules = schedules.len(),
        "Generated schedules"
    );
    Ok(schedules)
}

/// Backtracks over `buckets`, picking one section from each, keeping only
/// picks that overlap nothing already picked.
pub fn combinations(buckets: &[Vec<Section>], limit: usize) -> Vec<Schedule> {
    let mut results = Vec::new();
    if buckets.is_empty() || limit == 0 {
        return results;
    }
    let mut picked: Vec<&Section> = Vec::with_capacity(buckets.len());
    backtrack(buckets, &mut picked, &mut results, limit);
    results
}

fn backtrack<'a>(
    buckets: &'a [Vec<Section>],
    picked: &mut Vec<&'a Section>,
    results: &mut Vec<Schedule>,
    limit: usize,
) {
    if results.len() >= limit {
        return;
    }
    let depth = picked.len();
    if depth == buckets.len() {
        results.push(Schedule::from_sections(picked.iter().map(|s| (*s).clone())));
        return;
    }

    for candidate in &buckets[depth] {
        if picked.iter().any(|p| p.conflicts_with(candidate)) {
            continue;
        }
        picked.push(candidate);
        backtrack(buckets, picked, results, limit);
        picked.pop();
        if results.len() >= limit {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CourseCatalog;
    use crate::types::{Course, Meeting};

    fn section(id: &str, course_id: &str, day: u8, start: i32, end: i32) -> Section {
        Section {
            id: id.to_string(),
            course_id: course_id.to_string(),
            section_label: "001".to_string(),
            professor: "TBA".to_string(),
            meetings: vec![Meeting::new(day, start, end, "")],
        }
    }

    fn course(id: &str) -> Course {
        Course {
            id: id.to_string(),
            department: id.trim_end_matches(|c: char| c.is_ascii_digit()).to_string(),
            code: id.trim_start_matches(|c: char| c.is_ascii_alphabetic()).to_string(),
            title: id.to_string(),
            description: String::new(),
            credits: 3,
        }
    }

    fn ids(schedule: &Schedule) -> Vec<&str> {
        schedule.sections().iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_combinations_skip_overlaps() {
        let buckets = vec![
            vec![
                section("cs-1", "CS110", 1, 600, 675),
                section("cs-2", "CS110", 2, 600, 675),
            ],
            vec![
                section("ma-1", "MATH113", 1, 630, 720),
                section("ma-2", "MATH113", 1, 720, 795),
            ],
        ];

        let results = combinations(&buckets, 10);
        let found: Vec<Vec<&str>> = results.iter().map(ids).collect();
        assert_eq!(
            found,
            vec![
                vec!["cs-1", "ma-2"],
                vec!["cs-2", "ma-1"],
                vec!["cs-2", "ma-2"],
            ]
        );
        assert!(results.iter().all(|s| s.conflicts().is_empty()));
    }

    #[test]
    fn test_combinations_respects_limit() {
        let buckets = vec![
            vec![section("a", "A", 1, 480, 540), section("b", "A", 2, 480, 540)],
            vec![section("c", "B", 3, 480, 540), section("d", "B", 4, 480, 540)],
        ];
        assert_eq!(combinations(&buckets, 3).len(), 3);
        assert!(combinations(&buckets, 0).is_empty());
    }

    #[test]
    fn test_empty_bucket_yields_nothing() {
        let buckets = vec![vec![section("a", "A", 1, 480, 540)], vec![]];
        assert!(combinations(&buckets, 10).is_empty());
    }

    #[tokio::test]
    async fn test_generate_from_catalog() {
        let catalog = CourseCatalog::with_data(
            vec![course("CS110"), course("MATH113")],
            vec![
                section("1", "CS110", 1, 600, 675),
                section("2", "MATH113", 1, 600, 675),
                section("3", "MATH113", 3, 600, 675),
            ],
        );

        let requested = vec!["CS110".to_string(), "MATH113".to_string(), "CS110".to_string()];
        let schedules = generate_schedules(&catalog, &requested, DEFAULT_RESULT_LIMIT)
            .await
            .unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(ids(&schedules[0]), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_generate_rejects_too_many_courses() {
        let catalog = CourseCatalog::default();
        let requested: Vec<String> = (0..8).map(|i| format!("CS{}", 100 + i)).collect();
        let err = generate_schedules(&catalog, &requested, DEFAULT_RESULT_LIMIT)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::TooManyCourses { count: 8, max: 7 }));
    }
}
