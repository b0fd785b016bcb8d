//! The set of sections a student has committed to.
//!
//! A `Schedule` is never edited in place: `with_section` and `without_section`
//! return a new value, so readers holding an older snapshot keep a consistent view.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WorkflowError;
use crate::types::{Meeting, Section};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    sections: Vec<Section>,
}

/// Two distinct sections with overlapping meetings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeConflict<'s> {
    pub first: &'s Section,
    pub first_meeting: &'s Meeting,
    pub second: &'s Section,
    pub second_meeting: &'s Meeting,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schedule from stored sections, keeping the first copy of any repeated id.
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        let mut unique: Vec<Section> = Vec::new();
        for section in sections {
            if unique.iter().any(|s| s.id == section.id) {
                warn!(section_id = %section.id, "Dropping repeated section from stored schedule");
                continue;
            }
            unique.push(section);
        }
        Self { sections: unique }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn contains(&self, section_id: &str) -> bool {
        self.sections.iter().any(|s| s.id == section_id)
    }

    pub fn get(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Returns a new schedule with `section` appended.
    ///
    /// Fails with [`WorkflowError::DuplicateSection`] if the id is already present.
    pub fn with_section(&self, section: Section) -> Result<Schedule, WorkflowError> {
        if self.contains(&section.id) {
            return Err(WorkflowError::DuplicateSection {
                section_id: section.id,
            });
        }
        let mut sections = self.sections.clone();
        sections.push(section);
        Ok(Schedule { sections })
    }

    /// Returns a new schedule without `section_id`. Removing an absent id yields an equal schedule.
    pub fn without_section(&self, section_id: &str) -> Schedule {
        Schedule {
            sections: self
                .sections
                .iter()
                .filter(|s| s.id != section_id)
                .cloned()
                .collect(),
        }
    }

    /// Every pair of distinct sections whose valid meetings overlap.
    ///
    /// Conflicts are surfaced for display; the schedule does not refuse them.
    pub fn conflicts(&self) -> Vec<TimeConflict<'_>> {
        let mut conflicts = Vec::new();
        for (i, first) in self.sections.iter().enumerate() {
            for second in &self.sections[i + 1..] {
                for a in first.meetings.iter().filter(|m| m.is_valid()) {
                    for b in second.meetings.iter().filter(|m| m.is_valid()) {
                        if a.overlaps(b) {
                            conflicts.push(TimeConflict {
                                first,
                                first_meeting: a,
                                second,
                                second_meeting: b,
                            });
                        }
                    }
                }
            }
        }
        conflicts
    }

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, meetings: Vec<Meeting>) -> Section {
        Section {
            id: id.to_string(),
            course_id: "CS110".to_string(),
            section_label: "001".to_string(),
            professor: "Smith, John".to_string(),
            meetings,
        }
    }

    #[test]
    fn test_add_then_remove_restores_schedule() {
        let before = Schedule::from_sections(vec![section("1", vec![])]);
        let after = before
            .with_section(section("2", vec![Meeting::new(1, 600, 650, "")]))
            .unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after.without_section("2"), before);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let schedule = Schedule::new().with_section(section("1", vec![])).unwrap();
        let err = schedule.with_section(section("1", vec![])).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::DuplicateSection {
                section_id: "1".to_string()
            }
        );
        assert_eq!(schedule.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let schedule = Schedule::from_sections(vec![section("1", vec![])]);
        assert_eq!(schedule.without_section("missing"), schedule);
    }

    #[test]
    fn test_from_sections_drops_repeats() {
        let schedule = Schedule::from_sections(vec![
            section("1", vec![]),
            section("2", vec![]),
            section("1", vec![Meeting::new(2, 0, 30, "")]),
        ]);
        assert_eq!(schedule.len(), 2);
        assert!(schedule.get("1").unwrap().meetings.is_empty());
    }

    #[test]
    fn test_conflicts_between_distinct_sections() {
        let schedule = Schedule::from_sections(vec![
            section("1", vec![Meeting::new(1, 600, 630, "")]),
            section("2", vec![Meeting::new(1, 600, 630, "")]),
            section("3", vec![Meeting::new(1, 630, 700, "")]),
        ]);
        let conflicts = schedule.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].first.id, "1");
        assert_eq!(conflicts[0].second.id, "2");
    }

    #[test]
    fn test_serializes_as_plain_section_list() {
        let schedule = Schedule::from_sections(vec![section("1", vec![])]);
        let value = serde_json::to_value(&schedule).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["id"], "1");
    }
}
