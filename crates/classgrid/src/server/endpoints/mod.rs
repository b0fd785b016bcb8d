pub mod catalog;
pub mod grid;
pub mod schedule;
pub mod status;
