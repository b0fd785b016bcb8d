//! Weekly class schedule builder.
//!
//! The core is two pieces: the [`workflow`] that takes a student from a search
//! query to a committed section, and the [`grid`] layout that projects the
//! committed [`schedule::Schedule`] onto day x time-slot cells. Everything else
//! (catalog, persistence, HTTP server, Banner importer) feeds or exposes them.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod generate;
pub mod grid;
pub mod schedule;
pub mod server;
pub mod store;
pub mod time;
pub mod types;
pub mod workflow;
