use super::{OutputMatcher, answer_text};
use code_runner::kernel::OutputEvent;

/// Output equals `target`, by default after trimming both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactAnswer {
    pub mark: f64,
    pub name: Option<String>,
    pub target: String,
    pub strip: bool,
}

impl ExactAnswer {
    pub fn new(mark: f64, target: impl Into<String>) -> Self {
        Self {
            mark,
            name: None,
            target: target.into(),
            strip: true,
        }
    }

    pub fn strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }
}

impl OutputMatcher for ExactAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        let Some(text) = answer_text(output) else {
            return false;
        };
        if self.strip {
            text.trim() == self.target.trim()
        } else {
            text == self.target
        }
    }
}

/// Output starts with `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixAnswer {
    pub mark: f64,
    pub name: Option<String>,
    pub target: String,
}

impl PrefixAnswer {
    pub fn new(mark: f64, target: impl Into<String>) -> Self {
        Self {
            mark,
            name: None,
            target: target.into(),
        }
    }
}

impl OutputMatcher for PrefixAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        answer_text(output).is_some_and(|text| text.starts_with(&self.target))
    }
}

/// Same lines as `target`, ignoring whitespace at either end of each line.
#[derive(Debug, Clone, PartialEq)]
pub struct MultilineAnswer {
    pub mark: f64,
    pub name: Option<String>,
    pub target: String,
}

impl MultilineAnswer {
    pub fn new(mark: f64, target: impl Into<String>) -> Self {
        Self {
            mark,
            name: None,
            target: target.into(),
        }
    }
}

fn stripped_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

impl OutputMatcher for MultilineAnswer {
    fn matches(&self, output: &OutputEvent) -> bool {
        answer_text(output)
            .is_some_and(|text| stripped_lines(text) == stripped_lines(&self.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::test_support::{picture, stream, text};
    use image::{DynamicImage, RgbImage};

    #[test]
    fn test_exact_strips_by_default() {
        let answer = ExactAnswer::new(1.0, "[1] 50  2");
        assert!(answer.matches(&text("  [1] 50  2\n")));
        assert!(!answer.matches(&text("[1] 50 2")));
        let strict = ExactAnswer::new(1.0, "[1] 50  2").strip(false);
        assert!(!strict.matches(&text("[1] 50  2\n")));
        assert!(strict.matches(&stream("[1] 50  2")));
    }

    #[test]
    fn test_prefix() {
        let answer = PrefixAnswer::new(1.0, "'data.frame':");
        assert!(answer.matches(&stream("'data.frame':\t50 obs. of  2 variables:")));
        assert!(!answer.matches(&stream(" 'data.frame':")));
        assert!(!answer.matches(&picture(DynamicImage::ImageRgb8(RgbImage::new(1, 1)))));
    }

    #[test]
    fn test_multiline_ignores_line_edges() {
        let answer = MultilineAnswer::new(1.0, "  speed dist\n1   4    2\n");
        assert!(answer.matches(&text("speed dist  \n  1   4    2")));
        assert!(!answer.matches(&text("speed dist\n1 4 2")));
        assert!(!answer.matches(&text("speed dist\n1   4    2\n3   7    4")));
    }
}
