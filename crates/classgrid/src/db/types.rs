//! Row types for the catalog tables.

use crate::types::{Meeting, Section};

#[derive(Debug, Clone)]
pub struct DbSection {
    pub section_id: String,
    pub course_id: String,
    pub section_label: String,
    pub professor: String,
}

#[derive(Debug, Clone)]
pub struct DbMeeting {
    pub section_id: String,
    pub day: u8,
    pub start_minute: i32,
    pub end_minute: i32,
    pub location: String,
}

impl DbMeeting {
    pub fn to_meeting(&self) -> Meeting {
        Meeting::new(self.day, self.start_minute, self.end_minute, self.location.clone())
    }
}

impl DbSection {
    /// Attaches meetings, which must already be in display order.
    pub fn into_section(self, meetings: &[DbMeeting]) -> Section {
        Section {
            id: self.section_id,
            course_id: self.course_id,
            section_label: self.section_label,
            professor: self.professor,
            meetings: meetings.iter().map(DbMeeting::to_meeting).collect(),
        }
    }
}
