use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One fenced code block recovered from a notebook document.
///
/// Line numbers are 1-based and refer to the document the chunk was parsed
/// from. `end_line` is the last body line, so an empty chunk has
/// `end_line == start_line - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: String,
    pub language: String,
    pub start_line: usize,
    pub end_line: usize,
    pub classes: Vec<String>,
    pub options: String,
    pub id: String,
    pub attributes: BTreeMap<String, String>,
}

impl Chunk {
    /// A chunk with only code and position, as document transforms build them.
    pub fn new(code: impl Into<String>, language: impl Into<String>, start_line: usize) -> Self {
        let code = code.into();
        let end_line = (start_line + code.lines().count()).saturating_sub(1);
        Self {
            code,
            language: language.into(),
            start_line,
            end_line,
            classes: Vec::new(),
            options: String::new(),
            id: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Same metadata and position, different body.
    pub fn with_code(&self, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }
}
