//! JSON grading definitions.
//!
//! ```json
//! {
//!   "total": 15,
//!   "language": "r",
//!   "answers": [
//!     { "kind": "regex", "mark": 5, "pattern": "50\\s+2", "chunk": 1 },
//!     { "kind": "raw_regex", "mark": 5, "name": "head", "sample": "speed dist\n1 4 2" },
//!     { "kind": "image", "mark": 5, "source": { "solution_chunk": 4 },
//!       "box": [44, 81, 800, 770], "mode": "binary" }
//!   ]
//! }
//! ```
//!
//! `chunk` pins an answer to one reference chunk (checked with
//! [`assert_answers_only`](crate::assigner::assert_answers_only)). Image
//! answers take their expected picture from a file (relative to the
//! definition) or from the first image a reference chunk produced.

use crate::answers::{
    Answer, BestOfAnswer, ColourMode, CropBox, ExactAnswer, ImageAnswer, MultilineAnswer,
    PrefixAnswer, RawRegexAnswer, RegexAnswer,
};
use crate::error::MarkerError;
use crate::scheme::GradingScheme;
use code_runner::ExecutionReport;
use common::format_validation_errors;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use util::languages::KernelLanguage;
use validator::{Validate, ValidationError};

fn default_language() -> KernelLanguage {
    KernelLanguage::R
}

fn default_strip() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GradingDefinition {
    #[validate(range(min = 0.0, message = "Total must not be negative"))]
    pub total: f64,
    #[serde(default = "default_language")]
    pub language: KernelLanguage,
    #[validate(length(min = 1, message = "Definition must list at least one answer"))]
    #[validate(nested)]
    pub answers: Vec<AnswerDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerDefinition {
    #[validate(range(min = 0.0, message = "Mark must not be negative"))]
    pub mark: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference chunk this answer must score on, and only there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    #[serde(flatten)]
    #[validate(custom(function = "validate_kind"))]
    pub kind: AnswerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    Exact {
        target: String,
        #[serde(default = "default_strip")]
        strip: bool,
    },
    Prefix {
        target: String,
    },
    Multiline {
        target: String,
    },
    Regex {
        pattern: String,
    },
    RawRegex {
        sample: String,
    },
    Image {
        source: ImageSource,
        #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
        crop: Option<CropBox>,
        #[serde(default)]
        mode: ColourMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Alternatives sharing the outer mark.
    BestOf {
        options: Vec<AnswerKind>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    File(PathBuf),
    SolutionChunk(usize),
}

fn validate_kind(kind: &AnswerKind) -> Result<(), ValidationError> {
    let fail = |code: &'static str, message: &'static str| {
        let mut error = ValidationError::new(code);
        error.message = Some(message.into());
        Err(error)
    };
    match kind {
        AnswerKind::Exact { target, .. }
        | AnswerKind::Prefix { target }
        | AnswerKind::Multiline { target }
            if target.is_empty() =>
        {
            fail("empty_target", "Target text must not be empty")
        }
        AnswerKind::Regex { pattern } if pattern.is_empty() => {
            fail("empty_pattern", "Pattern must not be empty")
        }
        AnswerKind::RawRegex { sample } if sample.trim().is_empty() => {
            fail("empty_sample", "Sample must contain some text")
        }
        AnswerKind::Image {
            threshold: Some(t), ..
        } if !(t.is_finite() && *t >= 0.0) => {
            fail("bad_threshold", "Threshold must be a non-negative number")
        }
        AnswerKind::Image { crop: Some(b), .. } if b.right <= b.left || b.lower <= b.upper => {
            fail("bad_box", "Box must be (left, upper, right, lower) with positive size")
        }
        AnswerKind::BestOf { options } if options.is_empty() => {
            fail("empty_options", "best_of needs at least one option")
        }
        AnswerKind::BestOf { options } => options.iter().try_for_each(validate_kind),
        _ => Ok(()),
    }
}

impl GradingDefinition {
    pub fn from_json(json: &str) -> Result<Self, MarkerError> {
        let definition: Self = serde_json::from_str(json)?;
        definition
            .validate()
            .map_err(|e| MarkerError::InvalidDefinition(format_validation_errors(&e)))?;
        Ok(definition)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, MarkerError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| MarkerError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Build the answers into a scheme ready for validation.
    ///
    /// `base_dir` resolves relative image paths; `reference` supplies images
    /// taken from solution chunks.
    pub fn build(
        &self,
        base_dir: &Path,
        reference: &ExecutionReport,
    ) -> Result<GradingScheme, MarkerError> {
        let mut scheme = GradingScheme::new(self.total).language(self.language);
        for definition in &self.answers {
            let mut answer = build_kind(&definition.kind, definition.mark, base_dir, reference)?;
            if let Some(name) = &definition.name {
                answer = answer.named(name.clone());
            }
            scheme = match definition.chunk {
                Some(chunk) => scheme.answer_for_chunk(answer, chunk),
                None => scheme.answer(answer),
            };
        }
        Ok(scheme)
    }
}

fn build_kind(
    kind: &AnswerKind,
    mark: f64,
    base_dir: &Path,
    reference: &ExecutionReport,
) -> Result<Answer, MarkerError> {
    Ok(match kind {
        AnswerKind::Exact { target, strip } => ExactAnswer::new(mark, target).strip(*strip).into(),
        AnswerKind::Prefix { target } => PrefixAnswer::new(mark, target).into(),
        AnswerKind::Multiline { target } => MultilineAnswer::new(mark, target).into(),
        AnswerKind::Regex { pattern } => RegexAnswer::new(mark, pattern)?.into(),
        AnswerKind::RawRegex { sample } => RawRegexAnswer::new(mark, sample)?.into(),
        AnswerKind::Image {
            source,
            crop,
            mode,
            threshold,
        } => {
            let expected = load_image(source, base_dir, reference)?;
            let answer = ImageAnswer::new(mark, &expected, *crop, *mode);
            match threshold {
                Some(t) => answer.with_threshold(*t).into(),
                None => answer.into(),
            }
        }
        AnswerKind::BestOf { options } => BestOfAnswer::new(
            options
                .iter()
                .map(|option| build_kind(option, mark, base_dir, reference))
                .collect::<Result<_, _>>()?,
        )
        .into(),
    })
}

fn load_image(
    source: &ImageSource,
    base_dir: &Path,
    reference: &ExecutionReport,
) -> Result<DynamicImage, MarkerError> {
    match source {
        ImageSource::File(path) => {
            let path = base_dir.join(path);
            image::open(&path).map_err(|source| MarkerError::Image { path, source })
        }
        ImageSource::SolutionChunk(index) => reference
            .results
            .get(*index)
            .and_then(|result| result.outputs())
            .and_then(|outputs| outputs.iter().find_map(|o| o.image()))
            .cloned()
            .ok_or_else(|| {
                MarkerError::Configuration(format!("Reference chunk {index} produced no image"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definition() {
        let json = r#"{
            "total": 12,
            "answers": [
                { "kind": "exact", "mark": 2, "target": "[1] 4", "chunk": 0 },
                { "kind": "raw_regex", "mark": 5, "name": "head", "sample": "speed dist\n1 4 2" },
                { "kind": "image", "mark": 3, "source": { "file": "plot.png" }, "box": [1, 2, 30, 40] },
                { "kind": "best_of", "mark": 2, "options": [
                    { "kind": "prefix", "target": "[1] 4" },
                    { "kind": "regex", "pattern": "4$" }
                ] }
            ]
        }"#;
        let def = GradingDefinition::from_json(json).unwrap();
        assert_eq!(def.language, KernelLanguage::R);
        assert_eq!(def.answers.len(), 4);
        assert_eq!(def.answers[0].chunk, Some(0));
        assert!(matches!(def.answers[0].kind, AnswerKind::Exact { strip: true, .. }));
        match &def.answers[2].kind {
            AnswerKind::Image { source, crop, mode, threshold } => {
                assert_eq!(source, &ImageSource::File("plot.png".into()));
                assert_eq!(crop.unwrap(), CropBox::from([1, 2, 30, 40]));
                assert_eq!(*mode, ColourMode::Rgb);
                assert!(threshold.is_none());
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors_are_reported_by_path() {
        let json = r#"{
            "total": 5,
            "language": "python",
            "answers": [
                { "kind": "exact", "mark": 5, "target": "x" },
                { "kind": "prefix", "mark": -1, "target": "" }
            ]
        }"#;
        let err = GradingDefinition::from_json(json).unwrap_err();
        let MarkerError::InvalidDefinition(message) = err else {
            panic!("expected an invalid definition");
        };
        assert!(message.contains("answers[1].mark: Mark must not be negative"));
        assert!(message.contains("answers[1].kind: Target text must not be empty"));
    }

    #[test]
    fn test_empty_answers_rejected() {
        let err = GradingDefinition::from_json(r#"{ "total": 0, "answers": [] }"#).unwrap_err();
        assert!(err.to_string().contains("at least one answer"));
    }

    #[test]
    fn test_unknown_kind_is_json_error() {
        let err = GradingDefinition::from_json(
            r#"{ "total": 1, "answers": [ { "kind": "fuzzy", "mark": 1 } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, MarkerError::Json(_)));
    }
}
