use super::Answer;
use code_runner::kernel::OutputEvent;

/// Several acceptable answers for one expected result; the best one counts.
#[derive(Debug, Clone)]
pub struct BestOfAnswer {
    /// The largest mark among `options`.
    pub mark: f64,
    pub name: Option<String>,
    pub options: Vec<Answer>,
}

impl BestOfAnswer {
    pub fn new(options: Vec<Answer>) -> Self {
        let mark = options.iter().map(Answer::mark).fold(0.0, f64::max);
        Self {
            mark,
            name: None,
            options,
        }
    }

    pub fn score_outputs(&self, outputs: &[OutputEvent]) -> f64 {
        self.options
            .iter()
            .map(|option| option.score_outputs(outputs))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::test_support::{ran, skipped, text};
    use crate::answers::{ExactAnswer, PrefixAnswer};

    #[test]
    fn test_best_of_takes_the_highest() {
        let answer: Answer = BestOfAnswer::new(vec![
            ExactAnswer::new(2.0, "[1] 4").into(),
            PrefixAnswer::new(1.0, "[1]").into(),
        ])
        .into();
        assert_eq!(answer.mark(), 2.0);
        assert_eq!(answer.score(&ran(vec![text("[1] 4")])), 2.0);
        assert_eq!(answer.score(&ran(vec![text("[1] 5")])), 1.0);
        assert_eq!(answer.score(&ran(vec![text("4")])), 0.0);
        assert!(answer.score(&skipped()).is_nan());
    }
}
