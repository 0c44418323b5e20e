//! Circulation Desk: the background job scheduler
//!
//! A single-threaded cooperative queue of Extraction, Compendium,
//! Reorganization, and Optimization jobs. Jobs route to the owning
//! librarian (via [`crate::librarian::LibrarianRegistry`]) and apply
//! results back through [`crate::stacks::Stacks`] — relocate/merge, prune,
//! insert summary, spawn specialist.

mod desk;
mod job;

pub use desk::{CirculationConfig, CirculationDesk, VolumeSink};
pub use job::Job;
