//! Plain-text rendering of a laid-out week.

use super::{Grid, GridCell};

const TIME_WIDTH: usize = 9;
const CELL_WIDTH: usize = 14;

/// Draws the grid as a fixed-width table, one row per slot.
///
/// Block starts show the course and location, continuations show `|`,
/// and conflicted cells list every course sharing the slot.
pub fn render_text(grid: &Grid<'_>) -> String {
    let mut out = String::new();

    out.push_str(&pad("Time", TIME_WIDTH));
    for day in &grid.days {
        out.push_str(" | ");
        out.push_str(&pad(&day.to_string(), CELL_WIDTH));
    }
    out.push('\n');
    out.push_str(&"-".repeat(TIME_WIDTH + grid.days.len() * (CELL_WIDTH + 3)));
    out.push('\n');

    for (slot, row) in grid.slots.iter().zip(&grid.cells) {
        out.push_str(&pad(&slot.label(), TIME_WIDTH));
        for cell in row {
            out.push_str(" | ");
            out.push_str(&pad(&cell_text(cell), CELL_WIDTH));
        }
        out.push('\n');
    }

    for warning in &grid.warnings {
        out.push_str(&format!(
            "! skipped meeting {} of section {}: {}\n",
            warning.meeting_index, warning.section_id, warning.error
        ));
    }

    out.trim_end().to_string()
}

fn cell_text(cell: &GridCell<'_>) -> String {
    match cell.occupants.as_slice() {
        [] => String::new(),
        [only] if only.position.start => {
            format!("{} {}", only.section.course_id, only.meeting.display_location())
        }
        [_] => "|".to_string(),
        many => {
            let ids: Vec<&str> = many.iter().map(|o| o.section.course_id.as_str()).collect();
            format!("!{}", ids.join("/"))
        }
    }
}

fn pad(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}
