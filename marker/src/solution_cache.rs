//! Reference-solution execution reports, built once and reused.
//!
//! The reference run uses stop-on-error and must succeed. A built report is
//! kept in memory and written to
//! `{STORAGE_ROOT}/solutions/{stem}-{fingerprint}.json`; the fingerprint is a
//! SHA-256 prefix over the solution text and kernel language, so editing the
//! solution misses the old file.

use crate::error::MarkerError;
use code_runner::{ExecutionReport, SessionFactory, run_notebook};
use notebook::Notebook;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use util::languages::KernelLanguage;
use util::paths::{ensure_parent_dir, solution_cache_path};

const FINGERPRINT_LEN: usize = 16;

#[derive(Debug)]
pub struct SolutionCache {
    path: PathBuf,
    language: KernelLanguage,
    report: Option<ExecutionReport>,
}

fn fingerprint(text: &str, language: KernelLanguage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.kernel_name().as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

impl SolutionCache {
    pub fn new(path: impl Into<PathBuf>, language: KernelLanguage) -> Self {
        Self {
            path: path.into(),
            language,
            report: None,
        }
    }

    pub fn solution_path(&self) -> &Path {
        &self.path
    }

    /// Where the report for the solution's current text is persisted.
    pub fn cache_file(&self) -> Result<PathBuf, MarkerError> {
        let (_, file) = self.load_source()?;
        Ok(file)
    }

    fn load_source(&self) -> Result<(Notebook, PathBuf), MarkerError> {
        let notebook = Notebook::load(&self.path)?;
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "solution".to_string());
        let file = solution_cache_path(&stem, &fingerprint(&notebook.text, self.language));
        Ok((notebook, file))
    }

    /// The reference report: from memory, then disk, then a fresh run.
    pub async fn report(
        &mut self,
        sessions: &dyn SessionFactory,
    ) -> Result<&ExecutionReport, MarkerError> {
        if let Some(report) = self.report.take() {
            return Ok(self.report.insert(report));
        }

        let (notebook, file) = self.load_source()?;
        if let Some(report) = read_cached(&file) {
            debug!(path = %file.display(), "Loaded cached solution report");
            return Ok(self.report.insert(report));
        }
        let report = self.build(&notebook, &file, sessions).await?;
        Ok(self.report.insert(report))
    }

    /// Run the solution again, replacing both cached copies.
    pub async fn rebuild(
        &mut self,
        sessions: &dyn SessionFactory,
    ) -> Result<&ExecutionReport, MarkerError> {
        self.report = None;
        let (notebook, file) = self.load_source()?;
        let report = self.build(&notebook, &file, sessions).await?;
        Ok(self.report.insert(report))
    }

    async fn build(
        &self,
        notebook: &Notebook,
        file: &Path,
        sessions: &dyn SessionFactory,
    ) -> Result<ExecutionReport, MarkerError> {
        info!(solution = %self.path.display(), "Running reference solution");
        let report = run_notebook(notebook, self.language, sessions, true).await?;
        report.ensure_ok()?;

        ensure_parent_dir(file).map_err(|e| MarkerError::io(file, e))?;
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(file, json).map_err(|e| MarkerError::io(file, e))?;
        info!(path = %file.display(), chunks = report.results.len(), "Cached solution report");
        Ok(report)
    }
}

fn read_cached(file: &Path) -> Option<ExecutionReport> {
    let json = fs::read_to_string(file).ok()?;
    match serde_json::from_str(&json) {
        Ok(report) => Some(report),
        Err(err) => {
            warn!(path = %file.display(), error = %err, "Ignoring unreadable solution cache");
            None
        }
    }
}
