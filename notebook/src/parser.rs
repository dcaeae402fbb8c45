//! Chunk extraction from markdown-embedded-code notebooks.
//!
//! A single left-to-right scan over the document lines with two states,
//! outside and inside a fenced block. An opening fence looks like
//!
//! ```text
//! <indent>```{lang[ label][, key=value ...]}
//! ```
//!
//! and its indentation becomes the prefix the closing fence must reproduce
//! exactly, together with the same number of backticks. Body lines lose that
//! prefix when they carry it and are kept verbatim otherwise, so nested
//! looking fences inside instructional text survive as body text.
//!
//! Malformed headers are not errors: the line simply stays document text.
//! A block still open at the end of the document yields no chunk.

use crate::chunk::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*)(`{3,})[ \t]*\{(.*)\}[ \t]*$").expect("fence regex is valid")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.+\-]*$").expect("identifier regex is valid"));

/// Parsed contents of a `{...}` chunk header.
#[derive(Debug, Default, PartialEq)]
struct Header {
    language: String,
    classes: Vec<String>,
    options: String,
    id: String,
    attributes: BTreeMap<String, String>,
}

/// An opening fence being accumulated.
struct OpenBlock {
    indent: String,
    fence: String,
    header: Header,
    start_line: usize,
    body: Vec<String>,
}

/// Extract every well-formed chunk from `document`, in document order.
///
/// Chunks of all languages are returned; filtering is up to the caller.
pub fn extract(document: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in document.lines().enumerate() {
        let line_no = idx + 1;
        match open.take() {
            None => {
                open = open_fence(line, line_no);
            }
            Some(mut block) => {
                if is_close(line, &block.indent, &block.fence) {
                    chunks.push(finish(block));
                } else {
                    let body = line.strip_prefix(block.indent.as_str()).unwrap_or(line);
                    block.body.push(body.to_string());
                    open = Some(block);
                }
            }
        }
    }

    if let Some(block) = open {
        debug!(
            line = block.start_line - 1,
            "Unterminated chunk dropped at end of document"
        );
    }

    chunks
}

fn open_fence(line: &str, line_no: usize) -> Option<OpenBlock> {
    let caps = FENCE_OPEN.captures(line)?;
    let header = parse_header(&caps[3])?;
    Some(OpenBlock {
        indent: caps[1].to_string(),
        fence: caps[2].to_string(),
        header,
        start_line: line_no + 1,
        body: Vec::new(),
    })
}

fn is_close(line: &str, indent: &str, fence: &str) -> bool {
    line.strip_prefix(indent)
        .map(|rest| rest.trim_end() == fence)
        .unwrap_or(false)
}

fn finish(block: OpenBlock) -> Chunk {
    let end_line = (block.start_line + block.body.len()).saturating_sub(1);
    let Header {
        language,
        classes,
        options,
        id,
        attributes,
    } = block.header;
    Chunk {
        code: block.body.join("\n"),
        language,
        start_line: block.start_line,
        end_line,
        classes,
        options,
        id,
        attributes,
    }
}

/// Parse the text between the header braces. `None` means malformed.
fn parse_header(inner: &str) -> Option<Header> {
    let inner = inner.trim();
    if inner.starts_with('.') || inner.starts_with('#') {
        parse_pandoc_header(inner)
    } else {
        parse_rmarkdown_header(inner)
    }
}

/// `{r}`, `{r label}`, `{r, echo=FALSE}`, `{r setup, include=FALSE}`
fn parse_rmarkdown_header(inner: &str) -> Option<Header> {
    let split = inner
        .find(|c: char| c == ',' || c.is_whitespace())
        .unwrap_or(inner.len());
    let language = &inner[..split];
    if !IDENTIFIER.is_match(language) {
        return None;
    }

    let rest = inner[split..].trim_start();
    let options = rest.strip_prefix(',').unwrap_or(rest).trim().to_string();

    let mut header = Header {
        language: language.to_string(),
        options,
        ..Header::default()
    };

    for (pos, item) in split_options(&header.options).into_iter().enumerate() {
        match split_key_value(&item) {
            Some((key, value)) => {
                if key == "label" {
                    header.id = value.clone();
                }
                header.attributes.insert(key, value);
            }
            None if pos == 0 && header.id.is_empty() => header.id = item,
            None => {}
        }
    }

    Some(header)
}

/// `{.python .numberLines #fit startFrom="10"}`
fn parse_pandoc_header(inner: &str) -> Option<Header> {
    let mut header = Header::default();
    for token in inner.split_whitespace() {
        if let Some(class) = token.strip_prefix('.') {
            header.classes.push(class.to_string());
        } else if let Some(id) = token.strip_prefix('#') {
            header.id = id.to_string();
        } else if let Some((key, value)) = split_key_value(token) {
            header.attributes.insert(key, value);
        } else {
            return None;
        }
    }

    let language = header.classes.first()?.clone();
    if !IDENTIFIER.is_match(&language) {
        return None;
    }
    header.options = inner
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default();
    header.language = language;
    Some(header)
}

/// Split chunk options on commas that are not inside quotes or brackets.
fn split_options(options: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in options.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), _) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '(' | '[' | '{') => {
                depth += 1;
                current.push(c);
            }
            (None, ')' | ']' | '}') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, ',') if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items.retain(|item| !item.is_empty());
    items
}

fn split_key_value(item: &str) -> Option<(String, String)> {
    let (key, value) = item.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Some((key.to_string(), value.to_string()))
}
