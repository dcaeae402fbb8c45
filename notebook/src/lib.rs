//! # Notebook
//!
//! Reading markdown-embedded-code notebooks (R Markdown style `.Rmd` files):
//! extracting code chunks with their languages and line numbers, rewriting
//! chunk bodies in place, and generating student exercises from solutions.
//!
//! - [`parser`]: the chunk extraction state machine.
//! - [`chunk`]: the [`Chunk`] value type.
//! - [`exercise`]: solution → exercise transformation and marks checking.

pub mod chunk;
pub mod error;
pub mod exercise;
pub mod parser;

pub use chunk::Chunk;
pub use error::NotebookError;

use std::fs;
use std::path::Path;

/// A notebook document together with the chunks extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    pub text: String,
    pub chunks: Vec<Chunk>,
}

impl Notebook {
    /// Parse notebook text.
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let chunks = parser::extract(&text);
        Self { text, chunks }
    }

    /// Read a UTF-8 notebook file and parse it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NotebookError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(text))
    }

    /// Chunks whose header language is one of `languages`.
    pub fn chunks_in(&self, languages: &[&str]) -> Vec<Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| languages.contains(&chunk.language.as_str()))
            .cloned()
            .collect()
    }
}

/// Replace the bodies of `chunks` inside `text`, located by their line numbers.
///
/// Each replacement is written where the original body started, re-indented
/// with the opening fence's indentation; the remaining original body lines
/// are removed. Line endings follow the opening fence line.
pub fn replace_chunks(text: &str, chunks: &[Chunk]) -> String {
    let mut lines: Vec<String> = text.split_inclusive('\n').map(String::from).collect();

    for chunk in chunks {
        // 0-based index of the first body line; the fence sits just above it.
        let first = chunk.start_line.saturating_sub(1);
        if first == 0 || first > lines.len() {
            continue;
        }
        let fence = &lines[first - 1];
        let indent = fence[..fence.len() - fence.trim_start().len()].to_string();
        let eol = if fence.ends_with("\r\n") { "\r\n" } else { "\n" };

        let body: String = chunk
            .code
            .lines()
            .map(|line| format!("{indent}{line}{eol}"))
            .collect();

        if chunk.end_line < chunk.start_line {
            // Empty original body: `first` is the closing fence.
            if let Some(close) = lines.get_mut(first) {
                close.insert_str(0, &body);
            }
            continue;
        }

        let last = (chunk.end_line - 1).min(lines.len() - 1);
        for line in &mut lines[first..=last] {
            line.clear();
        }
        if let Some(slot) = lines.get_mut(first) {
            *slot = body;
        }
    }

    lines.concat()
}
