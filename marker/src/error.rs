//! Marker Error Types
//!
//! [`MarkerError`] covers everything that can stop a grading run: bad grading
//! definitions, answers that do not line up with the reference solution,
//! unreadable inputs, and failures bubbling up from notebook parsing or
//! execution.
//!
//! [`MarkerError::Configuration`] means the grading scheme itself is wrong;
//! no submission should be graded with it.

use code_runner::{KernelError, RunnerError};
use notebook::NotebookError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    /// The answer set does not reproduce the reference solution's marks.
    #[error("Grading configuration error: {0}")]
    Configuration(String),
    /// The grading definition failed validation.
    #[error("Invalid grading definition: {0}")]
    InvalidDefinition(String),
    #[error("Invalid answer pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Failed to load image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Execution(#[from] RunnerError),
}

impl MarkerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MarkerError::Io {
            path: path.into(),
            source,
        }
    }
}
