use std::path::PathBuf;

/// Errors raised while loading notebooks or checking generated exercises.
///
/// Chunk extraction itself never fails; malformed headers stay plain text.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Failed to read notebook {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Question chunk at line {line} has no marks line")]
    MissingMarks { line: usize },
    #[error("Question chunk at line {line} is out of {found}, expected {expected}")]
    TotalMismatch {
        line: usize,
        expected: f64,
        found: f64,
    },
    #[error("Question chunk at line {line} reports running total {found}, expected {expected}")]
    RunningTotalMismatch {
        line: usize,
        expected: f64,
        found: f64,
    },
    #[error("Notebook has no question chunks")]
    NoQuestions,
    #[error("Marks add up to {found}, expected {expected}")]
    IncompleteTotal { expected: f64, found: f64 },
}
