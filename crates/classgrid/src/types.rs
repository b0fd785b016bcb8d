/// Core schedule data: meetings, sections and catalog records
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time;

/// Minutes in a day; the latest valid meeting end.
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// One weekly-recurring time block.
///
/// A section like Mon/Wed 10-11 has two `Meeting` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meeting {
    /// 0 = Sunday, 1 = Monday, ..., 6 = Saturday
    pub day: u8,
    /// Minutes from midnight (e.g. 600 = 10:00 AM)
    #[serde(rename = "start_time")]
    pub start_minute: i32,
    #[serde(rename = "end_time")]
    pub end_minute: i32,
    /// Free text, empty when the room is not yet assigned
    #[serde(default)]
    pub location: String,
}

impl Meeting {
    pub fn new(day: u8, start_minute: i32, end_minute: i32, location: impl Into<String>) -> Self {
        Self {
            day,
            start_minute,
            end_minute,
            location: location.into(),
        }
    }

    /// Checks that the meeting is a non-empty interval within a single day.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.day > 6 {
            return Err(ValidationError::DayOutOfRange { day: self.day });
        }
        if self.start_minute >= self.end_minute {
            return Err(ValidationError::EmptyInterval {
                start: self.start_minute,
                end: self.end_minute,
            });
        }
        if self.start_minute < 0 || self.end_minute > MINUTES_PER_DAY {
            return Err(ValidationError::OutsideDay {
                start: self.start_minute,
                end: self.end_minute,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The meeting's weekday, or `None` for an out-of-range day index.
    pub fn weekday(&self) -> Option<Weekday> {
        time::weekday_from_index(self.day)
    }

    /// Half-open overlap test against `[start, end)`.
    pub fn overlaps_range(&self, start: i32, end: i32) -> bool {
        self.start_minute < end && self.end_minute > start
    }

    /// True if both meetings fall on the same day and their intervals overlap.
    pub fn overlaps(&self, other: &Meeting) -> bool {
        self.day == other.day && self.overlaps_range(other.start_minute, other.end_minute)
    }

    /// Location for display, "TBA" when unassigned.
    pub fn display_location(&self) -> &str {
        let trimmed = self.location.trim();
        if trimmed.is_empty() {
            "TBA"
        } else {
            trimmed
        }
    }

    /// e.g. "Mon 9:30 AM - 11:00 AM"
    pub fn describe(&self) -> String {
        format!(
            "{} {} - {}",
            time::day_abbrev(self.day),
            time::format_minutes(self.start_minute),
            time::format_minutes(self.end_minute)
        )
    }
}

/// One offering of a course that a student can add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// CRN, e.g. "17837"; the de-duplication key
    pub id: String,
    /// Parent course, e.g. "CS100"
    pub course_id: String,
    /// Section number, e.g. "001"
    #[serde(rename = "section", default)]
    pub section_label: String,
    #[serde(default)]
    pub professor: String,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

impl Section {
    /// Returns true if any meeting of `self` overlaps any meeting of `other`.
    pub fn conflicts_with(&self, other: &Section) -> bool {
        self.meetings
            .iter()
            .filter(|m| m.is_valid())
            .any(|a| other.meetings.iter().filter(|m| m.is_valid()).any(|b| a.overlaps(b)))
    }
}

/// A catalog search hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseResult {
    /// e.g. "CS110"
    pub id: String,
    /// e.g. "Principles of Computing"
    pub title: String,
    /// e.g. "110"
    pub code: String,
}

/// Full catalog record for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    /// e.g. "CS"
    #[serde(default)]
    pub department: String,
    /// e.g. "110"
    #[serde(default)]
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub credits: u32,
}

impl Course {
    pub fn result(&self) -> CourseResult {
        CourseResult {
            id: self.id.clone(),
            title: self.title.clone(),
            code: self.code.clone(),
        }
    }
}
