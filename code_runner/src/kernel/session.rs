//! One interpreter, driven request-then-drain.
//!
//! For every `execute` call the session:
//!
//! 1. sends an `execute_request` on the shell channel;
//! 2. waits (per-call timeout) for the `execute_reply` parented to it,
//!    skipping replies that belong to other requests;
//! 3. waits (busy timeout) for the `busy` status that opens the request's
//!    event sequence;
//! 4. drains events (poll timeout per event, per-call timeout overall) until
//!    the matching `idle` status, checking the input echo and decoding
//!    everything else.
//!
//! Anything that breaks this bracketing is a [`KernelError::ProtocolDesync`].

use crate::error::KernelError;
use crate::execution_config::ExecutionConfig;
use crate::kernel::message::{ExecuteRequest, KernelMessage, MessageKind};
use crate::kernel::output::{OutputEvent, decode};
use crate::kernel::transport::{KernelTransport, ProcessTransport};
use async_trait::async_trait;
use serde_json::Map;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use util::languages::KernelLanguage;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub silent: bool,
    pub persist_history: bool,
    pub stop_on_error: bool,
    /// Reply timeout for this call; the session default when `None`.
    pub timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            silent: false,
            persist_history: true,
            stop_on_error: true,
            timeout: None,
        }
    }
}

pub struct KernelSession {
    transport: Box<dyn KernelTransport>,
    language: KernelLanguage,
    config: ExecutionConfig,
    session_id: String,
    closed: bool,
}

impl KernelSession {
    /// Start an interpreter process for `language`.
    pub async fn open(language: KernelLanguage, config: ExecutionConfig) -> Result<Self, KernelError> {
        let (program, args) = config.command_for(language);
        let transport = ProcessTransport::spawn(&program, &args)?;
        let session = Self::with_transport(Box::new(transport), language, config);
        info!(
            "Opened {} kernel session {}",
            language.kernel_name(),
            session.session_id
        );
        Ok(session)
    }

    pub fn with_transport(
        transport: Box<dyn KernelTransport>,
        language: KernelLanguage,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            transport,
            language,
            config,
            session_id: Uuid::new_v4().to_string(),
            closed: false,
        }
    }

    pub fn language(&self) -> KernelLanguage {
        self.language
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `code` and collect its outputs in arrival order.
    pub async fn execute(
        &mut self,
        code: &str,
        options: ExecuteOptions,
    ) -> Result<Vec<OutputEvent>, KernelError> {
        if self.closed {
            return Err(KernelError::Closed);
        }

        let request = KernelMessage::execute_request(
            &self.session_id,
            &ExecuteRequest {
                code: code.to_string(),
                silent: options.silent,
                store_history: options.persist_history,
                user_expressions: Map::new(),
                allow_stdin: false,
                stop_on_error: options.stop_on_error,
            },
        );
        let msg_id = request.header.msg_id.clone();
        debug!("execute_request {}: {:?}", msg_id, code);
        self.transport.send(request).await?;

        let wait = options.timeout.unwrap_or_else(|| self.config.timeout());
        let reply = self.await_reply(&msg_id, wait).await?;
        if reply.content.get("status").and_then(|s| s.as_str()) == Some("error") {
            debug!("execute_reply {} reported an error", msg_id);
        }

        self.await_busy(&msg_id).await?;
        self.drain_to_idle(&msg_id, code, wait).await
    }

    async fn await_reply(&mut self, msg_id: &str, wait: Duration) -> Result<KernelMessage, KernelError> {
        let deadline = Instant::now() + wait;
        let timed_out = KernelError::Timeout {
            waiting_for: "execute_reply",
            after: wait,
        };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out);
            }
            let Some(reply) = self.transport.recv_reply(remaining).await? else {
                return Err(timed_out);
            };
            if reply.parent_id() != msg_id {
                debug!("Skipping {} reply for another request", reply.msg_type());
                continue;
            }
            if reply.kind() != MessageKind::ExecuteReply {
                return Err(KernelError::ProtocolDesync(format!(
                    "expected execute_reply, got {}",
                    reply.msg_type()
                )));
            }
            return Ok(reply);
        }
    }

    async fn await_busy(&mut self, msg_id: &str) -> Result<(), KernelError> {
        let wait = self.config.busy_timeout();
        let deadline = Instant::now() + wait;
        let timed_out = KernelError::Timeout {
            waiting_for: "busy status",
            after: wait,
        };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out);
            }
            let Some(event) = self.transport.recv_event(remaining).await? else {
                return Err(timed_out);
            };
            if event.parent_id() != msg_id {
                debug!("Skipping {} event for another request", event.msg_type());
                continue;
            }
            if event.kind() == MessageKind::Status && event.execution_state() == Some("busy") {
                return Ok(());
            }
            return Err(KernelError::ProtocolDesync(format!(
                "expected busy status before outputs, got {}",
                event.msg_type()
            )));
        }
    }

    async fn drain_to_idle(
        &mut self,
        msg_id: &str,
        code: &str,
        overall: Duration,
    ) -> Result<Vec<OutputEvent>, KernelError> {
        let poll = self.config.poll_timeout();
        let deadline = Instant::now() + overall;
        let mut outputs = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(KernelError::Timeout {
                    waiting_for: "idle status",
                    after: overall,
                });
            }
            let wait = poll.min(remaining);
            let Some(event) = self.transport.recv_event(wait).await? else {
                return Err(KernelError::Timeout {
                    waiting_for: "idle status",
                    after: wait,
                });
            };
            if event.parent_id() != msg_id {
                debug!("Skipping {} event for another request", event.msg_type());
                continue;
            }
            match event.kind() {
                MessageKind::Status => match event.execution_state() {
                    Some("idle") => return Ok(outputs),
                    Some("busy") => {
                        return Err(KernelError::ProtocolDesync(
                            "second busy status for one request".to_string(),
                        ));
                    }
                    state => debug!("Ignoring status {:?}", state),
                },
                MessageKind::ExecuteInput => {
                    let echoed = event.content.get("code").and_then(|c| c.as_str());
                    if echoed != Some(code) {
                        return Err(KernelError::ProtocolDesync(
                            "input echo does not match the submitted code".to_string(),
                        ));
                    }
                }
                _ => {
                    if let Some(output) = decode(&event)? {
                        outputs.push(output);
                    }
                }
            }
        }
    }

    /// Clear every user-defined name from the interpreter workspace.
    pub async fn reset(&mut self) -> Result<(), KernelError> {
        let options = ExecuteOptions {
            silent: true,
            persist_history: false,
            ..ExecuteOptions::default()
        };
        let outputs = self.execute(self.language.reset_code(), options).await?;
        for output in outputs.iter().filter(|o| o.is_error()) {
            warn!("Workspace reset reported: {}", output.text().unwrap_or_default());
        }
        Ok(())
    }

    /// Stop the interpreter. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<(), KernelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!("Closing kernel session {}", self.session_id);
        self.transport.shutdown().await
    }
}

/// Something that can start sessions; an [`ExecutionConfig`] starts real
/// interpreter processes.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, language: KernelLanguage) -> Result<KernelSession, KernelError>;
}

#[async_trait]
impl SessionFactory for ExecutionConfig {
    async fn open(&self, language: KernelLanguage) -> Result<KernelSession, KernelError> {
        KernelSession::open(language, self.clone()).await
    }
}

impl Drop for KernelSession {
    fn drop(&mut self) {
        if !self.closed {
            // The transport kills the process when it is dropped.
            debug!("Kernel session {} dropped without close", self.session_id);
        }
    }
}
