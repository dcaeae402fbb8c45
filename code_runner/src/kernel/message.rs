//! Wire messages exchanged with an interpreter bridge.
//!
//! Each line on the bridge's stdio is one JSON object laid out like a Jupyter
//! message, tagged with the logical channel it travels on:
//!
//! ```json
//! {"channel":"iopub","header":{"msg_id":"..","msg_type":"stream","session":".."},
//!  "parent_header":{"msg_id":"..","msg_type":"execute_request","session":".."},
//!  "content":{"name":"stdout","text":"[1] 1\n"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Logical channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Request/reply traffic.
    Shell,
    /// Broadcast status and output events.
    IoPub,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub msg_id: String,
    pub msg_type: String,
    pub session: String,
}

impl Header {
    pub fn new(msg_type: &str, session: &str) -> Self {
        Self {
            msg_id: Uuid::new_v4().to_string(),
            msg_type: msg_type.to_string(),
            session: session.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.msg_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMessage {
    pub channel: Channel,
    pub header: Header,
    #[serde(default, skip_serializing_if = "Header::is_empty")]
    pub parent_header: Header,
    #[serde(default)]
    pub content: Value,
}

/// Message types the session distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    ExecuteRequest,
    ExecuteReply,
    Status,
    ExecuteInput,
    Stream,
    ExecuteResult,
    DisplayData,
    UpdateDisplayData,
    ClearOutput,
    Error,
    Other(String),
}

impl MessageKind {
    pub fn parse(msg_type: &str) -> Self {
        match msg_type {
            "execute_request" => Self::ExecuteRequest,
            "execute_reply" => Self::ExecuteReply,
            "status" => Self::Status,
            "execute_input" => Self::ExecuteInput,
            "stream" => Self::Stream,
            "execute_result" => Self::ExecuteResult,
            "display_data" => Self::DisplayData,
            "update_display_data" => Self::UpdateDisplayData,
            "clear_output" => Self::ClearOutput,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Content of an `execute_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub silent: bool,
    pub store_history: bool,
    #[serde(default)]
    pub user_expressions: Map<String, Value>,
    #[serde(default)]
    pub allow_stdin: bool,
    pub stop_on_error: bool,
}

impl KernelMessage {
    pub fn new(channel: Channel, msg_type: &str, session: &str, content: Value) -> Self {
        Self {
            channel,
            header: Header::new(msg_type, session),
            parent_header: Header::default(),
            content,
        }
    }

    /// Build an `execute_request` on the shell channel.
    pub fn execute_request(session: &str, request: &ExecuteRequest) -> Self {
        let content = serde_json::to_value(request).unwrap_or(Value::Null);
        Self::new(Channel::Shell, "execute_request", session, content)
    }

    /// A message answering `self`, parented to its header.
    pub fn reply(&self, channel: Channel, msg_type: &str, content: Value) -> Self {
        Self {
            channel,
            header: Header::new(msg_type, &self.header.session),
            parent_header: self.header.clone(),
            content,
        }
    }

    /// A `status` event for `self` with the given execution state.
    pub fn status(&self, state: &str) -> Self {
        self.reply(Channel::IoPub, "status", json!({ "execution_state": state }))
    }

    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.header.msg_type)
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_header.msg_id
    }

    /// `execution_state` of a status message.
    pub fn execution_state(&self) -> Option<&str> {
        self.content.get("execution_state").and_then(Value::as_str)
    }

    /// Parse the content of an `execute_request`.
    pub fn as_execute_request(&self) -> Option<ExecuteRequest> {
        if self.kind() != MessageKind::ExecuteRequest {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str) -> ExecuteRequest {
        ExecuteRequest {
            code: code.to_string(),
            silent: false,
            store_history: true,
            user_expressions: Map::new(),
            allow_stdin: false,
            stop_on_error: true,
        }
    }

    #[test]
    fn test_request_serializes_without_parent() {
        let msg = KernelMessage::execute_request("sess", &request("a <- 1"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["channel"], "shell");
        assert_eq!(value["header"]["msg_type"], "execute_request");
        assert_eq!(value["content"]["code"], "a <- 1");
        assert_eq!(value["content"]["stop_on_error"], true);
        assert!(value.get("parent_header").is_none());
    }

    #[test]
    fn test_reply_is_parented() {
        let msg = KernelMessage::execute_request("sess", &request("1"));
        let busy = msg.status("busy");
        assert_eq!(busy.channel, Channel::IoPub);
        assert_eq!(busy.parent_id(), msg.header.msg_id);
        assert_eq!(busy.header.session, "sess");
        assert_eq!(busy.execution_state(), Some("busy"));
        assert_ne!(busy.header.msg_id, msg.header.msg_id);
    }

    #[test]
    fn test_parse_wire_line() {
        let line = r#"{"channel":"iopub","header":{"msg_id":"x","msg_type":"stream"},"content":{"name":"stdout","text":"hi"}}"#;
        let msg: KernelMessage = serde_json::from_str(line).unwrap();
        assert_eq!(msg.kind(), MessageKind::Stream);
        assert_eq!(msg.parent_id(), "");
        assert_eq!(msg.header.session, "");
        assert_eq!(MessageKind::parse("comm_open"), MessageKind::Other("comm_open".into()));
    }

    #[test]
    fn test_as_execute_request() {
        let msg = KernelMessage::execute_request("s", &request("x"));
        assert_eq!(msg.as_execute_request().unwrap().code, "x");
        assert!(msg.status("idle").as_execute_request().is_none());
    }
}
