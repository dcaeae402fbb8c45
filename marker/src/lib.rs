//! # Marker Library
//!
//! Grades notebook submissions by comparing what their chunks print and draw
//! against a set of weighted answers.
//!
//! ## Key Concepts
//! - **Answers** ([`answers`]): predicates over one chunk's outputs, each worth
//!   a mark. Text answers look at printed text and streams; image answers
//!   compare pictures by RMS difference.
//! - **Score grid** ([`grid`]): every answer scored against every chunk. An
//!   answer earns its best score over the whole document.
//! - **Assignment checks** ([`assigner`], [`scheme`]): before grading, the
//!   answer set must award exactly the total to the reference solution, and
//!   pinned answers must score on their chunk alone.
//! - **Solution cache** ([`solution_cache`]): the reference run, persisted.
//! - **Reports** ([`report`]): per-answer marks for a submission.
//!
//! ## Typical flow
//! ```text
//! definition.json + solution.Rmd
//!     -> SolutionCache::report()      reference ExecutionReport
//!     -> GradingDefinition::build()   GradingScheme
//!     -> validate(&reference)         ValidatedScheme
//!     -> grader().grade_all(..)       MarkReport per submission
//! ```

pub mod answers;
pub mod assigner;
pub mod definition;
pub mod error;
pub mod grid;
pub mod report;
pub mod scheme;
pub mod solution_cache;
pub mod submissions;

pub use answers::{Answer, OutputMatcher};
pub use definition::GradingDefinition;
pub use error::MarkerError;
pub use grid::ScoreGrid;
pub use report::{MarkEntry, MarkReport, summarize_results};
pub use scheme::{GradedSubmission, Grader, GradingScheme, GradingStage, ValidatedScheme};
pub use solution_cache::SolutionCache;
pub use submissions::{DirectoryLister, SubmissionLister};

use code_runner::SessionFactory;
use std::path::Path;

/// Load a grading definition, run (or reuse) its reference solution, and
/// validate the answers against it.
pub async fn prepare_grader(
    definition_path: &Path,
    solution_path: &Path,
    sessions: &dyn SessionFactory,
) -> Result<Grader, MarkerError> {
    let definition = GradingDefinition::load(definition_path)?;
    let base_dir = definition_path.parent().unwrap_or(Path::new("."));

    let mut cache = SolutionCache::new(solution_path, definition.language);
    let reference = cache.report(sessions).await?;
    let scheme = definition.build(base_dir, reference)?;
    Ok(scheme.validate(reference)?.grader())
}
