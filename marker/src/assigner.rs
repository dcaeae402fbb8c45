//! Authoring-time checks of an answer set against the reference solution.
//!
//! These catch answers that never fire, fire twice, or fire on the wrong
//! chunk before any submission is graded. They do not stop a submission from
//! satisfying an answer with some other chunk; scoring takes each answer's
//! best chunk, whichever it is.

use crate::answers::Answer;
use crate::error::MarkerError;
use crate::grid::ScoreGrid;
use code_runner::ExecutionReport;

/// Tolerance when comparing sums of fractional marks.
const EPSILON: f64 = 1e-9;

/// The reference solution must score exactly `total`.
pub fn check_total(grid: &ScoreGrid, total: f64) -> Result<(), MarkerError> {
    let scored = grid.total();
    if (scored - total).abs() > EPSILON {
        return Err(MarkerError::Configuration(format!(
            "Reference solution scores {scored}, expected {total}"
        )));
    }
    Ok(())
}

/// `answer` must score on reference chunk `chunk_index` and nowhere else.
pub fn assert_answers_only(
    answer: &Answer,
    reference: &ExecutionReport,
    chunk_index: usize,
) -> Result<(), MarkerError> {
    let label = answer.name().unwrap_or("unnamed");
    let Some(target) = reference.results.get(chunk_index) else {
        return Err(MarkerError::Configuration(format!(
            "Answer {label} targets chunk {chunk_index}, but the reference has {} chunks",
            reference.results.len()
        )));
    };

    let score = answer.score(target);
    if score.is_nan() || score <= 0.0 {
        return Err(MarkerError::Configuration(format!(
            "Answer {label} does not score on reference chunk {chunk_index} (line {})",
            target.chunk.start_line
        )));
    }

    let elsewhere: Vec<String> = reference
        .results
        .iter()
        .enumerate()
        .filter(|(i, result)| *i != chunk_index && answer.score(result) > 0.0)
        .map(|(i, result)| format!("{i} (line {})", result.chunk.start_line))
        .collect();
    if !elsewhere.is_empty() {
        return Err(MarkerError::Configuration(format!(
            "Answer {label} also scores on reference chunks {}",
            elsewhere.join(", ")
        )));
    }
    Ok(())
}
