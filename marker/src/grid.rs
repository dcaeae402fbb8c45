use crate::answers::Answer;
use code_runner::ExecutionReport;

/// Marks each answer would award each chunk: one row per answer, one column
/// per chunk. Skipped chunks hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGrid {
    pub rows: Vec<Vec<f64>>,
}

impl ScoreGrid {
    pub fn build(answers: &[Answer], report: &ExecutionReport) -> Self {
        let rows = answers
            .iter()
            .map(|answer| report.results.iter().map(|result| answer.score(result)).collect())
            .collect();
        Self { rows }
    }

    /// Best mark per answer across all chunks. `NaN` cells are ignored; a row
    /// with nothing else counts 0.
    pub fn row_maxima(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .copied()
                    .filter(|v| !v.is_nan())
                    .fold(0.0, f64::max)
            })
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.row_maxima().iter().sum()
    }
}
