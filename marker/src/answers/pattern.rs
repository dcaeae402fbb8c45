use super::{OutputMatcher, answer_text};
use crate::error::MarkerError;
use code_runner::kernel::OutputEvent;
use regex::Regex;

/// Matches an optional R-style `[n] ` output prompt; prefix a pattern with it.
pub const OPTIONAL_PROMPT: &str = r"\s*(?:\[\d+\]\s+)?";

/// Output contains a match for `pattern` (a search, not a full match).
#[derive(Debug, Clone)]
pub struct RegexAnswer {
    pub mark: f64,
    pub name: Option<String>,
    regex: Regex,
}

impl RegexAnswer {
    pub fn new(mark: f64, pattern: &str) -> Result<Self, MarkerError> {
        Ok(Self {
            mark,
            name: None,
            regex: compile(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl OutputMatcher for RegexAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        answer_text(output).is_some_and(|text| self.regex.is_match(text))
    }
}

/// A [`RegexAnswer`] built from a pasted sample of the expected output.
#[derive(Debug, Clone)]
pub struct RawRegexAnswer {
    pub mark: f64,
    pub name: Option<String>,
    pub sample: String,
    regex: Regex,
}

impl RawRegexAnswer {
    pub fn new(mark: f64, sample: impl Into<String>) -> Result<Self, MarkerError> {
        let sample = sample.into();
        let pattern = raw_to_regex(&sample);
        if pattern.is_empty() {
            return Err(MarkerError::InvalidDefinition(
                "raw regex sample has no non-blank lines".to_string(),
            ));
        }
        let regex = compile(&pattern)?;
        Ok(Self {
            mark,
            name: None,
            sample,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl OutputMatcher for RawRegexAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        answer_text(output).is_some_and(|text| self.regex.is_match(text))
    }
}

fn compile(pattern: &str) -> Result<Regex, MarkerError> {
    Regex::new(pattern).map_err(|source| MarkerError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Turn literal console output into a pattern tolerant of layout drift.
///
/// Leading and trailing blank lines are dropped. Each remaining line is
/// escaped, may have any whitespace at either end, and has its internal
/// whitespace runs relaxed to `\s+`. Lines may end in `\n` or `\r\n`.
pub fn raw_to_regex(sample: &str) -> String {
    let lines: Vec<&str> = sample.lines().collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);

    lines[first..=last]
        .iter()
        .map(|line| {
            let words: Vec<String> = line.split_whitespace().map(regex::escape).collect();
            format!(r"\s*{}\s*", words.join(r"\s+"))
        })
        .collect::<Vec<_>>()
        .join(r"\r?\n")
}
