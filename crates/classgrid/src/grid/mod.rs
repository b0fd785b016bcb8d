//! Weekly grid layout: projects a schedule onto (day, slot) cells.
//!
//! Every meeting that overlaps a cell is reported, so a cell holding more than
//! one occupant is a scheduling conflict the caller can render or flag.

mod render;

pub use render::render_text;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ValidationError;
use crate::schedule::Schedule;
use crate::time;
use crate::types::{Meeting, Section};

/// A fixed time bucket `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: i32,
    pub end: i32,
}

impl Slot {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Consecutive `width`-minute slots starting at `start`, covering up to `end`.
    ///
    /// Returns an empty list for a zero width or an empty window. A slot that
    /// would run past `i32::MAX` is clamped to end at `end`.
    pub fn span(start: i32, end: i32, width: i32) -> Vec<Slot> {
        if width <= 0 || start >= end {
            return Vec::new();
        }
        let mut slots = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let Some(next) = cursor.checked_add(width) else {
                slots.push(Slot::new(cursor, end));
                break;
            };
            slots.push(Slot::new(cursor, next));
            cursor = next;
        }
        slots
    }

    /// e.g. "9:30 AM"
    pub fn label(&self) -> String {
        time::format_minutes(self.start)
    }

    /// True if `meeting` overlaps this slot (half-open on both sides).
    pub fn is_occupied_by(&self, meeting: &Meeting) -> bool {
        meeting.overlaps_range(self.start, self.end)
    }

    /// Where in its block `meeting` sits for this slot.
    pub fn position_of(&self, meeting: &Meeting) -> BlockPosition {
        BlockPosition {
            start: self.start <= meeting.start_minute && meeting.start_minute < self.end,
            end: self.start < meeting.end_minute && meeting.end_minute <= self.end,
        }
    }
}

/// Placement of one slot inside a merged meeting block.
///
/// A meeting that fits inside a single slot is both `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPosition {
    pub start: bool,
    pub end: bool,
}

impl BlockPosition {
    pub const START: BlockPosition = BlockPosition {
        start: true,
        end: false,
    };
    pub const MIDDLE: BlockPosition = BlockPosition {
        start: false,
        end: false,
    };
    pub const END: BlockPosition = BlockPosition {
        start: false,
        end: true,
    };
    pub const WHOLE: BlockPosition = BlockPosition {
        start: true,
        end: true,
    };
}

/// One meeting occupying a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupant<'s> {
    pub section: &'s Section,
    pub meeting: &'s Meeting,
    pub position: BlockPosition,
}

/// Everything occupying a single (day, slot) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridCell<'s> {
    pub occupants: Vec<Occupant<'s>>,
}

impl<'s> GridCell<'s> {
    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// More than one meeting claims this cell.
    pub fn is_conflict(&self) -> bool {
        self.occupants.len() > 1
    }
}

/// A meeting excluded from layout because its interval is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingWarning {
    pub section_id: String,
    pub meeting_index: usize,
    pub error: ValidationError,
}

/// A conflicted cell, addressed by day and slot.
#[derive(Debug, Clone, Serialize)]
pub struct CellConflict<'g, 's> {
    pub day: Weekday,
    pub slot: Slot,
    pub occupants: &'g [Occupant<'s>],
}

/// The laid-out week. `cells[slot][day]` follows the order of `slots` and `days`.
#[derive(Debug, Clone, Serialize)]
pub struct Grid<'s> {
    pub days: Vec<Weekday>,
    pub slots: Vec<Slot>,
    pub cells: Vec<Vec<GridCell<'s>>>,
    pub warnings: Vec<MeetingWarning>,
}

impl<'s> Grid<'s> {
    pub fn cell(&self, slot_index: usize, day_index: usize) -> Option<&GridCell<'s>> {
        self.cells.get(slot_index)?.get(day_index)
    }

    /// Looks up a cell by weekday instead of column index.
    pub fn cell_on(&self, day: Weekday, slot_index: usize) -> Option<&GridCell<'s>> {
        let day_index = self.days.iter().position(|d| *d == day)?;
        self.cell(slot_index, day_index)
    }

    /// Every cell that more than one meeting occupies.
    pub fn conflicts(&self) -> Vec<CellConflict<'_, 's>> {
        let mut conflicts = Vec::new();
        for (slot, row) in self.slots.iter().zip(&self.cells) {
            for (day, cell) in self.days.iter().zip(row) {
                if cell.is_conflict() {
                    conflicts.push(CellConflict {
                        day: *day,
                        slot: *slot,
                        occupants: &cell.occupants,
                    });
                }
            }
        }
        conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        self.cells.iter().flatten().any(GridCell::is_conflict)
    }
}

/// Lays out a committed schedule. See [`layout_sections`].
pub fn layout<'s>(schedule: &'s Schedule, days: &[Weekday], slots: &[Slot]) -> Grid<'s> {
    layout_sections(schedule.sections(), days, slots)
}

/// Projects `sections` onto a `days` x `slots` grid.
///
/// Malformed meetings are left out and listed in [`Grid::warnings`], each logged once.
pub fn layout_sections<'s>(sections: &'s [Section], days: &[Weekday], slots: &[Slot]) -> Grid<'s> {
    let mut warnings = Vec::new();
    let mut placeable: Vec<(&'s Section, &'s Meeting)> = Vec::new();

    for section in sections {
        for (meeting_index, meeting) in section.meetings.iter().enumerate() {
            match meeting.validate() {
                Ok(()) => placeable.push((section, meeting)),
                Err(error) => {
                    warn!(
                        section_id = %section.id,
                        meeting_index,
                        error = %error,
                        "Skipping malformed meeting in grid layout"
                    );
                    warnings.push(MeetingWarning {
                        section_id: section.id.clone(),
                        meeting_index,
                        error,
                    });
                }
            }
        }
    }

    let cells = slots
        .iter()
        .map(|slot| {
            days.iter()
                .map(|day| {
                    let occupants = placeable
                        .iter()
                        .filter(|&&(_, m)| m.weekday() == Some(*day) && slot.is_occupied_by(m))
                        .map(|&(section, meeting)| Occupant {
                            section,
                            meeting,
                            position: slot.position_of(meeting),
                        })
                        .collect();
                    GridCell { occupants }
                })
                .collect()
        })
        .collect();

    Grid {
        days: days.to_vec(),
        slots: slots.to_vec(),
        cells,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, course_id: &str, meetings: Vec<Meeting>) -> Section {
        Section {
            id: id.to_string(),
            course_id: course_id.to_string(),
            section_label: "001".to_string(),
            professor: "Smith, John".to_string(),
            meetings,
        }
    }

    fn half_hours(from: i32, to: i32) -> Vec<Slot> {
        Slot::span(from, to, 30)
    }

    #[test]
    fn test_slot_span() {
        let slots = Slot::span(540, 660, 30);
        assert_eq!(
            slots,
            vec![
                Slot::new(540, 570),
                Slot::new(570, 600),
                Slot::new(600, 630),
                Slot::new(630, 660)
            ]
        );
        assert_eq!(slots[1].label(), "9:30 AM");
        assert!(Slot::span(540, 660, 0).is_empty());
    }

    #[test]
    fn test_slot_span_width_past_i32_max() {
        assert_eq!(Slot::span(480, 1320, i32::MAX), vec![Slot::new(480, 1320)]);
        assert_eq!(
            Slot::span(0, 1440, 1000),
            vec![Slot::new(0, 1000), Slot::new(1000, 2000)]
        );
    }

    #[test]
    fn test_placement_sweep() {
        // Every 5-minute start/end pair between 8:00 and 12:00 on half-hour slots
        let slots = half_hours(480, 720);
        for start in (480..720).step_by(5) {
            for end in (start + 5..=720).step_by(5) {
                let sections = vec![section("1", "CS110", vec![Meeting::new(1, start, end, "")])];
                let grid = layout_sections(&sections, &[Weekday::Mon], &slots);

                let expected: Vec<usize> = slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.start < end && start < slot.end)
                    .map(|(i, _)| i)
                    .collect();
                let occupied: Vec<usize> = (0..slots.len())
                    .filter(|i| !grid.cell(*i, 0).unwrap().is_empty())
                    .collect();
                assert_eq!(occupied, expected, "meeting {}-{}", start, end);

                let positions: Vec<BlockPosition> = occupied
                    .iter()
                    .map(|i| {
                        let cell = grid.cell(*i, 0).unwrap();
                        assert_eq!(cell.occupants.len(), 1);
                        cell.occupants[0].position
                    })
                    .collect();
                let starts = positions.iter().filter(|p| p.start).count();
                let ends = positions.iter().filter(|p| p.end).count();
                assert_eq!(starts, 1, "meeting {}-{}", start, end);
                assert_eq!(ends, 1, "meeting {}-{}", start, end);
                assert!(positions[0].start);
                assert!(positions[positions.len() - 1].end);
            }
        }
    }

    #[test]
    fn test_meeting_spanning_three_slots() {
        // Mon 9:30-11:00 against 9:00, 9:30, 10:00, 10:30
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(1, 570, 660, "")])]);
        let grid = layout(&schedule, &[Weekday::Mon], &half_hours(540, 660));

        assert!(grid.cell(0, 0).unwrap().is_empty());

        let positions: Vec<BlockPosition> = (1..4)
            .map(|i| {
                let cell = grid.cell(i, 0).unwrap();
                assert_eq!(cell.occupants.len(), 1);
                cell.occupants[0].position
            })
            .collect();
        assert_eq!(
            positions,
            vec![BlockPosition::START, BlockPosition::MIDDLE, BlockPosition::END]
        );
    }

    #[test]
    fn test_single_slot_meeting_is_start_and_end() {
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(3, 600, 630, "")])]);
        let grid = layout(&schedule, &[Weekday::Wed], &half_hours(570, 660));

        assert!(grid.cell(0, 0).unwrap().is_empty());
        assert_eq!(grid.cell(1, 0).unwrap().occupants[0].position, BlockPosition::WHOLE);
        assert!(grid.cell(2, 0).unwrap().is_empty());
    }

    #[test]
    fn test_meeting_inside_one_slot_without_touching_edges() {
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(2, 605, 620, "")])]);
        let grid = layout(&schedule, &[Weekday::Tue], &half_hours(600, 660));
        assert_eq!(grid.cell(0, 0).unwrap().occupants[0].position, BlockPosition::WHOLE);
        assert!(grid.cell(1, 0).unwrap().is_empty());
    }

    #[test]
    fn test_unaligned_meeting_start_and_end_slots() {
        // 9:15-10:50 starts inside 9:00 and ends inside 10:30
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(1, 555, 650, "")])]);
        let grid = layout(&schedule, &[Weekday::Mon], &half_hours(540, 690));

        let occupied: Vec<usize> = (0..grid.slots.len())
            .filter(|i| !grid.cell(*i, 0).unwrap().is_empty())
            .collect();
        assert_eq!(occupied, vec![0, 1, 2, 3]);

        let starts = (0..4)
            .filter(|i| grid.cell(*i, 0).unwrap().occupants[0].position.start)
            .count();
        let ends = (0..4)
            .filter(|i| grid.cell(*i, 0).unwrap().occupants[0].position.end)
            .count();
        assert_eq!(starts, 1);
        assert_eq!(ends, 1);
        assert!(grid.cell(0, 0).unwrap().occupants[0].position.start);
        assert!(grid.cell(3, 0).unwrap().occupants[0].position.end);
    }

    #[test]
    fn test_two_sections_same_time_report_conflict() {
        let schedule = Schedule::from_sections(vec![
            section("1", "CS110", vec![Meeting::new(1, 600, 630, "ENGR 1103")]),
            section("2", "MATH200", vec![Meeting::new(1, 600, 630, "EXPL L004")]),
        ]);
        let grid = layout(&schedule, &time::school_week(), &half_hours(570, 660));

        let cell = grid.cell_on(Weekday::Mon, 1).unwrap();
        assert!(cell.is_conflict());
        let ids: Vec<&str> = cell.occupants.iter().map(|o| o.section.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let conflicts = grid.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].day, Weekday::Mon);
        assert_eq!(conflicts[0].slot, Slot::new(600, 630));
        assert!(grid.has_conflicts());
    }

    #[test]
    fn test_malformed_meeting_excluded_and_reported_once() {
        let schedule = Schedule::from_sections(vec![section(
            "1",
            "CS110",
            vec![Meeting::new(1, 660, 600, ""), Meeting::new(1, 600, 630, "")],
        )]);
        let grid = layout(&schedule, &[Weekday::Mon], &half_hours(540, 720));

        assert_eq!(grid.warnings.len(), 1);
        assert_eq!(grid.warnings[0].meeting_index, 0);
        assert_eq!(
            grid.warnings[0].error,
            ValidationError::EmptyInterval { start: 660, end: 600 }
        );

        let occupied: usize = grid.cells.iter().flatten().filter(|c| !c.is_empty()).count();
        assert_eq!(occupied, 1);
    }

    #[test]
    fn test_weekend_meetings_not_on_weekday_grid() {
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(6, 600, 660, "")])]);
        let grid = layout(&schedule, &time::school_week(), &half_hours(540, 720));
        assert!(grid.cells.iter().flatten().all(GridCell::is_empty));
        assert!(grid.warnings.is_empty());

        let weekend = layout(&schedule, &[Weekday::Sun, Weekday::Sat], &half_hours(540, 720));
        assert!(weekend.cell_on(Weekday::Sun, 2).unwrap().is_empty());
        assert_eq!(weekend.cell_on(Weekday::Sat, 2).unwrap().occupants.len(), 1);
    }

    #[test]
    fn test_grid_serializes_positions() {
        let schedule =
            Schedule::from_sections(vec![section("1", "CS110", vec![Meeting::new(1, 600, 630, "")])]);
        let grid = layout(&schedule, &[Weekday::Mon], &half_hours(600, 630));
        let value = serde_json::to_value(&grid).unwrap();
        assert_eq!(value["days"][0], "Mon");
        assert_eq!(value["cells"][0][0]["occupants"][0]["section"]["id"], "1");
        assert_eq!(value["cells"][0][0]["occupants"][0]["position"]["start"], true);
    }
}
