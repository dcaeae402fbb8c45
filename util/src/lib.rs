//! Shared plumbing for the grader crates: configuration, storage paths,
//! kernel language metadata and test helpers.

pub mod config;
pub mod languages;
pub mod paths;
pub mod test_helpers;
