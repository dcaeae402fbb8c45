//! # Mark Report Module
//!
//! Serializable grading results for one submission, plus a plain-text summary
//! of an execution report for eyeballing what a notebook actually did.
//!
//! ## JSON Output Example
//!
//! ```json
//! {
//!   "submission": "alice.Rmd",
//!   "entries": [
//!     { "name": "head", "awarded": 5.0, "possible": 5.0 },
//!     { "name": "unnamed", "awarded": 0.0, "possible": 2.5 }
//!   ],
//!   "total": 5.0,
//!   "possible": 7.5,
//!   "graded_at": "2026-10-19T09:12:44Z"
//! }
//! ```
//!
//! Entries keep answer order. Awarded marks are rounded to two decimals.

use crate::answers::Answer;
use crate::grid::ScoreGrid;
use chrono::{DateTime, Utc};
use code_runner::ExecutionReport;
use code_runner::kernel::{OutputContent, OutputEvent};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Round to two decimal places.
#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    pub name: String,
    pub awarded: f64,
    pub possible: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkReport {
    /// Submission file name, when graded from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<String>,
    pub entries: Vec<MarkEntry>,
    pub total: f64,
    pub possible: f64,
    pub graded_at: DateTime<Utc>,
}

impl MarkReport {
    pub fn from_grid(answers: &[Answer], grid: &ScoreGrid) -> Self {
        let entries: Vec<MarkEntry> = answers
            .iter()
            .zip(grid.row_maxima())
            .map(|(answer, awarded)| MarkEntry {
                name: answer.name().unwrap_or("unnamed").to_string(),
                awarded: round2(awarded),
                possible: answer.mark(),
            })
            .collect();
        let total = round2(entries.iter().map(|e| e.awarded).sum());
        let possible = entries.iter().map(|e| e.possible).sum();
        Self {
            submission: None,
            entries,
            total,
            possible,
            graded_at: Utc::now(),
        }
    }

    pub fn for_submission(mut self, submission: impl Into<String>) -> Self {
        self.submission = Some(submission.into());
        self
    }
}

impl fmt::Display for MarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(submission) = &self.submission {
            writeln!(f, "{submission}")?;
        }
        for entry in &self.entries {
            writeln!(f, "  {}: {}/{}", entry.name, entry.awarded, entry.possible)?;
        }
        write!(f, "  total: {}/{}", self.total, self.possible)
    }
}

fn describe(output: &OutputEvent) -> String {
    match &output.content {
        OutputContent::Text(text) | OutputContent::Error(text) => text.trim().to_string(),
        OutputContent::Stream { text, .. } => text.trim().to_string(),
        OutputContent::Image(_) => "<image>".to_string(),
    }
}

/// One line per executed chunk: ` {index}: {code} - {first output}`.
///
/// Empty chunks show `(no code)`; chunks without output (or skipped) show
/// `None`.
pub fn summarize_results(report: &ExecutionReport) -> String {
    report
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let code = result.chunk.code.trim();
            let code = if code.is_empty() { "(no code)" } else { code };
            let first = result
                .outputs()
                .and_then(|outputs| outputs.first())
                .map(describe)
                .unwrap_or_else(|| "None".to_string());
            format!(" {i}: {code} - {first}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
