//! Exercise generation from solution notebooks.
//!
//! A solution notebook marks its questions with `#-` comment lines inside a
//! chunk. Generating the exercise keeps only the comment scaffolding of those
//! chunks:
//!
//! * `#- ...` lines are kept as they are;
//! * `#<- code` lines become `code`, so starter code that would not parse as
//!   a comment can still be shipped;
//! * `#m <mark>` lines expand to `#- <mark> marks / <total> (total <running> so far)`,
//!   where the running total includes this question;
//! * every other line, solution code included, is removed.
//!
//! Chunks without a `#-` line (setup chunks, data loading) are left alone.

use crate::chunk::Chunk;
use crate::error::NotebookError;
use crate::{Notebook, replace_chunks};
use once_cell::sync::Lazy;
use regex::Regex;

static QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#-").expect("question regex is valid"));

static MARK_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*#m\s+((?:[0-9]*\.)?[0-9]+)").expect("mark line regex is valid")
});

static MARK_FULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*#-\s+((?:[0-9]*\.)?[0-9]+)\s+marks\s+/\s+((?:[0-9]*\.)?[0-9]+)\s+\(total\s+((?:[0-9]*\.)?[0-9]+)",
    )
    .expect("full mark regex is valid")
});

const EPSILON: f64 = 1e-9;

/// Chunks that pose a question, i.e. contain a line starting with `#-`.
pub fn question_chunks(chunks: &[Chunk]) -> Vec<&Chunk> {
    chunks
        .iter()
        .filter(|chunk| QUESTION_RE.is_match(&chunk.code))
        .collect()
}

/// Strip solution code from one question chunk.
///
/// Returns the exercise code and the running total after this chunk.
pub fn process_code(code: &str, running: f64, total: f64) -> (String, f64) {
    let mut running = running;
    let mut lines = Vec::new();

    for line in code.split_inclusive('\n') {
        let stripped = line.trim();
        if !stripped.starts_with('#') {
            continue;
        }
        if let Some(caps) = MARK_LINE_RE.captures(stripped) {
            let mark: f64 = caps[1].parse().unwrap_or(0.0);
            running += mark;
            let indent = &line[..line.len() - line.trim_start().len()];
            let eol = if line.ends_with('\n') { "\n" } else { "" };
            let shown = (running * 1e9).round() / 1e9;
            lines.push(format!(
                "{indent}#- {mark} marks / {total} (total {shown} so far){eol}"
            ));
        } else if stripped.starts_with("#<- ") {
            lines.push(line.replacen("#<- ", "", 1));
        } else if stripped.starts_with("#-") {
            lines.push(line.to_string());
        }
    }

    (lines.concat(), running)
}

/// Read the `(mark, out_of, running)` triple from the first expanded marks line.
pub fn get_marks(code: &str) -> Option<(f64, f64, f64)> {
    code.lines().find_map(|line| {
        let caps = MARK_FULL_RE.captures(line)?;
        let value = |i: usize| caps[i].parse::<f64>().ok();
        Some((value(1)?, value(2)?, value(3)?))
    })
}

/// Check that the marks lines of `questions` are consistent with `total`.
pub fn check_marks(questions: &[&Chunk], total: f64) -> Result<(), NotebookError> {
    if questions.is_empty() {
        return Err(NotebookError::NoQuestions);
    }

    let mut running = 0.0;
    for chunk in questions {
        let (mark, out_of, expected_running) =
            get_marks(&chunk.code).ok_or(NotebookError::MissingMarks {
                line: chunk.start_line,
            })?;
        if (out_of - total).abs() > EPSILON {
            return Err(NotebookError::TotalMismatch {
                line: chunk.start_line,
                expected: total,
                found: out_of,
            });
        }
        running += mark;
        if (running - expected_running).abs() > EPSILON {
            return Err(NotebookError::RunningTotalMismatch {
                line: chunk.start_line,
                expected: running,
                found: expected_running,
            });
        }
    }

    if (running - total).abs() > EPSILON {
        return Err(NotebookError::IncompleteTotal {
            expected: total,
            found: running,
        });
    }
    Ok(())
}

/// Rewrite the question chunks of `solution` into exercise form.
pub fn solution_to_exercise(solution: &Notebook, total: f64) -> String {
    let mut running = 0.0;
    let replacements: Vec<Chunk> = question_chunks(&solution.chunks)
        .into_iter()
        .map(|chunk| {
            let (code, next) = process_code(&chunk.code, running, total);
            running = next;
            chunk.with_code(code.trim_end_matches('\n'))
        })
        .collect();
    replace_chunks(&solution.text, &replacements)
}

/// Generate the exercise for `solution_text` and verify its marks add up.
pub fn make_check_exercise(solution_text: &str, total: f64) -> Result<String, NotebookError> {
    let solution = Notebook::parse(solution_text);
    let exercise = solution_to_exercise(&solution, total);
    let generated = Notebook::parse(&exercise);
    check_marks(&question_chunks(&generated.chunks), total)?;
    Ok(exercise)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLUTION: &str = "\
# Cars

```{r}
cars <- read.csv('cars.csv')
```

```{r}
#- Show the dimensions of the data frame.
#m 5
dim(cars)
```

```{r}
#- Make a plot of speed against distance.
#<- plot(?)
#m 2.5
plot(cars)
```
";

    #[test]
    fn test_process_code_keeps_only_scaffolding() {
        assert_eq!(process_code("#- foo\n#- bar", 0.0, 10.0).0, "#- foo\n#- bar");
        assert_eq!(process_code("#- foo\na = 1\n#- bar", 0.0, 10.0).0, "#- foo\n#- bar");
        assert_eq!(process_code("#- foo\na = 1\n# bar", 0.0, 10.0).0, "#- foo\n");
        assert_eq!(process_code("#- foo\n#<- a = ?\n# bar", 0.0, 10.0).0, "#- foo\na = ?\n");
        assert_eq!(
            process_code("#- foo\n  #<- a = ?\n#- bar", 0.0, 10.0).0,
            "#- foo\n  a = ?\n#- bar"
        );
    }

    #[test]
    fn test_process_code_expands_marks() {
        let (code, running) = process_code("#- q\n#m 5\nx", 10.0, 50.0);
        assert_eq!(code, "#- q\n#- 5 marks / 50 (total 15 so far)\n");
        assert_eq!(running, 15.0);
    }

    #[test]
    fn test_process_code_rounds_running_total() {
        let (first, running) = process_code("#m 0.1\n", 0.0, 1.0);
        assert_eq!(first, "#- 0.1 marks / 1 (total 0.1 so far)\n");
        let (second, _) = process_code("#m 0.2\n", running, 1.0);
        assert_eq!(second, "#- 0.2 marks / 1 (total 0.3 so far)\n");
        let (third, _) = process_code("#m 0.333\n", 0.3, 1.0);
        assert_eq!(third, "#- 0.333 marks / 1 (total 0.633 so far)\n");
    }

    #[test]
    fn test_question_chunks() {
        let nb = Notebook::parse(SOLUTION);
        assert_eq!(nb.chunks.len(), 3);
        assert_eq!(question_chunks(&nb.chunks).len(), 2);
    }

    #[test]
    fn test_make_check_exercise() {
        let exercise = make_check_exercise(SOLUTION, 7.5).unwrap();
        assert!(exercise.contains("cars <- read.csv('cars.csv')"));
        assert!(!exercise.contains("dim(cars)"));
        assert!(exercise.contains("#- 5 marks / 7.5 (total 5 so far)\n"));
        assert!(exercise.contains("plot(?)\n#- 2.5 marks / 7.5 (total 7.5 so far)\n```"));
        // Both solution lines are gone.
        assert_eq!(exercise.lines().count(), SOLUTION.lines().count() - 2);
    }

    #[test]
    fn test_make_check_exercise_wrong_total() {
        let err = make_check_exercise(SOLUTION, 10.0).unwrap_err();
        assert!(matches!(err, NotebookError::IncompleteTotal { .. }));
    }

    #[test]
    fn test_check_marks_missing_marks() {
        let nb = Notebook::parse("```{r}\n#- question\nx\n```\n");
        let err = check_marks(&question_chunks(&nb.chunks), 5.0).unwrap_err();
        assert!(matches!(err, NotebookError::MissingMarks { line: 2 }));
    }

    #[test]
    fn test_check_marks_bad_running_total() {
        let nb = Notebook::parse(
            "```{r}\n#- 2 marks / 4 (total 2 so far)\n```\n\n```{r}\n#- 2 marks / 4 (total 3 so far)\n```\n",
        );
        let err = check_marks(&question_chunks(&nb.chunks), 4.0).unwrap_err();
        assert!(matches!(err, NotebookError::RunningTotalMismatch { line: 6, .. }));
    }
}
