//! Grading scheme lifecycle.
//!
//! ```text
//! GradingScheme::new(total)          Unconfigured
//!     .answer(..) / .answer_for_chunk(..)   AnswersRegistered
//!     .validate(&reference)?         Validated      (ValidatedScheme)
//!     .grader()                      ReadyToGrade   (Grader)
//! ```
//!
//! Only a scheme that reproduces its total on the reference solution can
//! produce a [`Grader`].

use crate::answers::Answer;
use crate::assigner::{assert_answers_only, check_total};
use crate::error::MarkerError;
use crate::grid::ScoreGrid;
use crate::report::MarkReport;
use crate::submissions::SubmissionLister;
use code_runner::{ExecutionReport, SessionFactory, run_notebook};
use notebook::Notebook;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use util::languages::KernelLanguage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingStage {
    Unconfigured,
    AnswersRegistered,
    Validated,
    ReadyToGrade,
}

impl fmt::Display for GradingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GradingStage::Unconfigured => "unconfigured",
            GradingStage::AnswersRegistered => "answers-registered",
            GradingStage::Validated => "validated",
            GradingStage::ReadyToGrade => "ready-to-grade",
        };
        f.write_str(name)
    }
}

/// Answers being collected for an exercise worth `total` marks.
#[derive(Debug, Clone)]
pub struct GradingScheme {
    total: f64,
    language: KernelLanguage,
    answers: Vec<Answer>,
    /// Reference chunk each answer is pinned to, if any.
    pins: Vec<Option<usize>>,
}

impl GradingScheme {
    pub fn new(total: f64) -> Self {
        Self {
            total,
            language: KernelLanguage::R,
            answers: Vec::new(),
            pins: Vec::new(),
        }
    }

    pub fn language(mut self, language: KernelLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn answer(mut self, answer: impl Into<Answer>) -> Self {
        self.answers.push(answer.into());
        self.pins.push(None);
        self
    }

    /// Register `answer` and require that it scores on reference chunk
    /// `chunk_index` only.
    pub fn answer_for_chunk(mut self, answer: impl Into<Answer>, chunk_index: usize) -> Self {
        self.answers.push(answer.into());
        self.pins.push(Some(chunk_index));
        self
    }

    pub fn stage(&self) -> GradingStage {
        if self.answers.is_empty() {
            GradingStage::Unconfigured
        } else {
            GradingStage::AnswersRegistered
        }
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// Check the answers against the reference solution's report.
    ///
    /// The reference run must have succeeded, every pinned answer must score
    /// on its chunk alone, and the best marks must add up to the total.
    pub fn validate(self, reference: &ExecutionReport) -> Result<ValidatedScheme, MarkerError> {
        reference.ensure_ok()?;
        if self.answers.is_empty() {
            return Err(MarkerError::Configuration(
                "Grading scheme has no answers".to_string(),
            ));
        }
        for (answer, pin) in self.answers.iter().zip(&self.pins) {
            if let Some(chunk_index) = pin {
                assert_answers_only(answer, reference, *chunk_index)?;
            }
        }
        let grid = ScoreGrid::build(&self.answers, reference);
        if let Err(err) = check_total(&grid, self.total) {
            for (i, max) in grid.row_maxima().iter().enumerate() {
                if *max < self.answers[i].mark() {
                    warn!(
                        answer = self.answers[i].name().unwrap_or("unnamed"),
                        scored = max,
                        mark = self.answers[i].mark(),
                        "Answer under-scores on the reference solution"
                    );
                }
            }
            return Err(err);
        }

        info!(
            answers = self.answers.len(),
            total = self.total,
            stage = %GradingStage::Validated,
            "Grading scheme validated"
        );
        Ok(ValidatedScheme {
            total: self.total,
            language: self.language,
            answers: self.answers,
        })
    }
}

/// A scheme known to award exactly its total to the reference solution.
#[derive(Debug, Clone)]
pub struct ValidatedScheme {
    total: f64,
    language: KernelLanguage,
    answers: Vec<Answer>,
}

impl ValidatedScheme {
    pub fn stage(&self) -> GradingStage {
        GradingStage::Validated
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn grader(self) -> Grader {
        info!(stage = %GradingStage::ReadyToGrade, "Grader ready");
        Grader {
            scheme: self,
            stop_on_error: false,
        }
    }
}

/// Outcome of grading one file from a [`SubmissionLister`].
#[derive(Debug)]
pub struct GradedSubmission {
    pub path: PathBuf,
    pub result: Result<MarkReport, MarkerError>,
}

/// Scores submissions against a validated scheme.
///
/// Submissions run with stop-on-error off by default, so one broken chunk
/// does not cost the marks of every later chunk.
#[derive(Debug, Clone)]
pub struct Grader {
    scheme: ValidatedScheme,
    stop_on_error: bool,
}

impl Grader {
    pub fn stage(&self) -> GradingStage {
        GradingStage::ReadyToGrade
    }

    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn scheme(&self) -> &ValidatedScheme {
        &self.scheme
    }

    pub fn score_report(&self, report: &ExecutionReport) -> MarkReport {
        let grid = ScoreGrid::build(&self.scheme.answers, report);
        MarkReport::from_grid(&self.scheme.answers, &grid)
    }

    /// Run a notebook's text in a fresh session and score it.
    pub async fn grade_text(
        &self,
        text: &str,
        sessions: &dyn SessionFactory,
    ) -> Result<MarkReport, MarkerError> {
        let notebook = Notebook::parse(text);
        self.grade_notebook(&notebook, sessions).await
    }

    pub async fn grade_path(
        &self,
        path: &Path,
        sessions: &dyn SessionFactory,
    ) -> Result<MarkReport, MarkerError> {
        let notebook = Notebook::load(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let report = self.grade_notebook(&notebook, sessions).await?;
        info!(submission = %name, total = report.total, "Graded submission");
        Ok(report.for_submission(name))
    }

    /// Grade every listed submission in turn. A failure on one submission is
    /// recorded and grading moves on.
    pub async fn grade_all(
        &self,
        lister: &dyn SubmissionLister,
        sessions: &dyn SessionFactory,
    ) -> Result<Vec<GradedSubmission>, MarkerError> {
        let mut graded = Vec::new();
        for path in lister.submissions()? {
            let result = self.grade_path(&path, sessions).await;
            if let Err(err) = &result {
                warn!(submission = %path.display(), error = %err, "Failed to grade submission");
            }
            graded.push(GradedSubmission { path, result });
        }
        Ok(graded)
    }

    async fn grade_notebook(
        &self,
        notebook: &Notebook,
        sessions: &dyn SessionFactory,
    ) -> Result<MarkReport, MarkerError> {
        let report = run_notebook(
            notebook,
            self.scheme.language,
            sessions,
            self.stop_on_error,
        )
        .await?;
        Ok(self.score_report(&report))
    }
}
