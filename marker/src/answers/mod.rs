//! Expected results and how they score executed chunks.
//!
//! Every [`Answer`] awards its full mark when *any* output of a chunk
//! matches, and 0 otherwise. A chunk that was skipped scores `NaN` so callers
//! can tell "not applicable" apart from "wrong". [`BestOfAnswer`] scores the
//! best of several alternatives.
//!
//! Text answers only look at text results and stream output; error text
//! never earns marks. Image answers only look at images.

pub mod best_of;
pub mod bitmap;
pub mod pattern;
pub mod text;

pub use best_of::BestOfAnswer;
pub use bitmap::{ColourMode, CropBox, ImageAnswer};
pub use pattern::{OPTIONAL_PROMPT, RawRegexAnswer, RegexAnswer, raw_to_regex};
pub use text::{ExactAnswer, MultilineAnswer, PrefixAnswer};

use code_runner::ExecutionResult;
use code_runner::kernel::{OutputEvent, OutputKind};

/// Decides whether a single output is the expected one.
pub trait OutputMatcher {
    fn matches(&self, output: &OutputEvent) -> bool;
}

/// Text a text answer may compare against.
pub(crate) fn answer_text(output: &OutputEvent) -> Option<&str> {
    match output.kind {
        OutputKind::Text | OutputKind::Stream => output.text(),
        OutputKind::Image | OutputKind::Error => None,
    }
}

#[derive(Debug, Clone)]
pub enum Answer {
    Exact(ExactAnswer),
    Prefix(PrefixAnswer),
    Multiline(MultilineAnswer),
    Regex(RegexAnswer),
    RawRegex(RawRegexAnswer),
    Image(ImageAnswer),
    BestOf(BestOfAnswer),
}

impl Answer {
    pub fn mark(&self) -> f64 {
        match self {
            Answer::Exact(a) => a.mark,
            Answer::Prefix(a) => a.mark,
            Answer::Multiline(a) => a.mark,
            Answer::Regex(a) => a.mark,
            Answer::RawRegex(a) => a.mark,
            Answer::Image(a) => a.mark,
            Answer::BestOf(a) => a.mark,
        }
    }

    pub fn name(&self) -> Option<&str> {
        let name = match self {
            Answer::Exact(a) => &a.name,
            Answer::Prefix(a) => &a.name,
            Answer::Multiline(a) => &a.name,
            Answer::Regex(a) => &a.name,
            Answer::RawRegex(a) => &a.name,
            Answer::Image(a) => &a.name,
            Answer::BestOf(a) => &a.name,
        };
        name.as_deref()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        let slot = match &mut self {
            Answer::Exact(a) => &mut a.name,
            Answer::Prefix(a) => &mut a.name,
            Answer::Multiline(a) => &mut a.name,
            Answer::Regex(a) => &mut a.name,
            Answer::RawRegex(a) => &mut a.name,
            Answer::Image(a) => &mut a.name,
            Answer::BestOf(a) => &mut a.name,
        };
        *slot = Some(name.into());
        self
    }

    /// Mark for one chunk's result; `NaN` if the chunk was skipped.
    pub fn score(&self, result: &ExecutionResult) -> f64 {
        match result.outputs() {
            Some(outputs) => self.score_outputs(outputs),
            None => f64::NAN,
        }
    }

    pub fn score_outputs(&self, outputs: &[OutputEvent]) -> f64 {
        match self {
            Answer::BestOf(best) => best.score_outputs(outputs),
            _ if outputs.iter().any(|output| self.matches(output)) => self.mark(),
            _ => 0.0,
        }
    }
}

impl OutputMatcher for Answer {
    fn matches(&self, output: &OutputEvent) -> bool {
        match self {
            Answer::Exact(a) => a.matches(output),
            Answer::Prefix(a) => a.matches(output),
            Answer::Multiline(a) => a.matches(output),
            Answer::Regex(a) => a.matches(output),
            Answer::RawRegex(a) => a.matches(output),
            Answer::Image(a) => a.matches(output),
            Answer::BestOf(a) => a.options.iter().any(|option| option.matches(output)),
        }
    }
}

macro_rules! answer_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(impl From<$ty> for Answer {
            fn from(answer: $ty) -> Self {
                Answer::$variant(answer)
            }
        })*
    };
}

answer_from! {
    Exact => ExactAnswer,
    Prefix => PrefixAnswer,
    Multiline => MultilineAnswer,
    Regex => RegexAnswer,
    RawRegex => RawRegexAnswer,
    Image => ImageAnswer,
    BestOf => BestOfAnswer,
}
