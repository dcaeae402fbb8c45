//! Typed outputs decoded from iopub events.

use crate::error::KernelError;
use crate::kernel::message::{KernelMessage, MessageKind};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PNG_MIME: &str = "image/png";
const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Text,
    Stream,
    Image,
    Error,
}

#[derive(Debug, Clone)]
pub enum OutputContent {
    Text(String),
    Stream { name: String, text: String },
    Image(DynamicImage),
    Error(String),
}

/// One output produced by an execution request.
///
/// Serialises as its raw message; deserialising decodes the message again,
/// so images survive a round trip through a persisted report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "KernelMessage", try_from = "KernelMessage")]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub raw: KernelMessage,
    pub content: OutputContent,
}

impl OutputEvent {
    /// Text carried by text, stream and error outputs.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            OutputContent::Text(text) | OutputContent::Error(text) => Some(text.as_str()),
            OutputContent::Stream { text, .. } => Some(text.as_str()),
            OutputContent::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        match &self.content {
            OutputContent::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutputKind::Error
    }
}

impl From<OutputEvent> for KernelMessage {
    fn from(event: OutputEvent) -> Self {
        event.raw
    }
}

impl TryFrom<KernelMessage> for OutputEvent {
    type Error = KernelError;

    fn try_from(message: KernelMessage) -> Result<Self, KernelError> {
        let msg_type = message.msg_type().to_string();
        decode(&message)?.ok_or_else(|| {
            KernelError::ProtocolDesync(format!("{msg_type} message carries no output"))
        })
    }
}

/// Decode one iopub message.
///
/// `Ok(None)` means the message is valid but has nothing worth keeping
/// (`clear_output`, or display data without a PNG or plain-text form).
pub fn decode(message: &KernelMessage) -> Result<Option<OutputEvent>, KernelError> {
    let content = &message.content;
    let decoded = match message.kind() {
        MessageKind::Error => Some((OutputKind::Error, OutputContent::Error(error_text(content)))),
        MessageKind::Stream => {
            let name = str_field(content, "name").unwrap_or("stdout").to_string();
            let text = str_field(content, "text").unwrap_or_default().to_string();
            Some((OutputKind::Stream, OutputContent::Stream { name, text }))
        }
        MessageKind::ExecuteResult | MessageKind::DisplayData | MessageKind::UpdateDisplayData => {
            decode_data(content.get("data"))?
        }
        MessageKind::ClearOutput => None,
        other => {
            return Err(KernelError::ProtocolDesync(format!(
                "unexpected {:?} message on the event channel",
                other
            )));
        }
    };

    Ok(decoded.map(|(kind, content)| OutputEvent {
        kind,
        raw: message.clone(),
        content,
    }))
}

fn str_field<'a>(content: &'a Value, key: &str) -> Option<&'a str> {
    content.get(key).and_then(Value::as_str)
}

/// Traceback lines joined by newlines, or `ename: evalue` without a traceback.
fn error_text(content: &Value) -> String {
    let traceback: Vec<&str> = content
        .get("traceback")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !traceback.is_empty() {
        return traceback.join("\n");
    }
    format!(
        "{}: {}",
        str_field(content, "ename").unwrap_or("Error"),
        str_field(content, "evalue").unwrap_or_default()
    )
}

/// Multi-line strings may arrive split into a list of lines.
fn mime_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(parts.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn decode_data(data: Option<&Value>) -> Result<Option<(OutputKind, OutputContent)>, KernelError> {
    let Some(data) = data else {
        return Ok(None);
    };

    if let Some(encoded) = data.get(PNG_MIME).and_then(mime_text) {
        let malformed = |reason: String| KernelError::MalformedPayload {
            mime: PNG_MIME.to_string(),
            reason,
        };
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| malformed(e.to_string()))?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|e| malformed(e.to_string()))?;
        return Ok(Some((OutputKind::Image, OutputContent::Image(image))));
    }

    Ok(data
        .get(TEXT_MIME)
        .and_then(mime_text)
        .map(|text| (OutputKind::Text, OutputContent::Text(text))))
}
