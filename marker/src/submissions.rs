use crate::error::MarkerError;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of submission documents to grade.
pub trait SubmissionLister {
    fn submissions(&self) -> Result<Vec<PathBuf>, MarkerError>;
}

/// Lists `*.Rmd` and `*.md` files directly inside a directory, sorted by
/// path. A file path lists just that file.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    root: PathBuf,
}

impl DirectoryLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn is_notebook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("rmd") || ext.eq_ignore_ascii_case("md"))
}

impl SubmissionLister for DirectoryLister {
    fn submissions(&self) -> Result<Vec<PathBuf>, MarkerError> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let entries = fs::read_dir(&self.root).map_err(|e| MarkerError::io(&self.root, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| MarkerError::io(&self.root, e))?.path();
            if path.is_file() && is_notebook(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
