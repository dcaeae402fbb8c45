//! In-memory transport that answers execute requests from a closure.
//!
//! Each request is handed to the script, which returns what the fake
//! interpreter should emit. The transport then queues a well-formed reply
//! and `busy ... idle` event sequence around those outputs unless one of the
//! fault emits says otherwise.

use crate::error::KernelError;
use crate::execution_config::ExecutionConfig;
use crate::kernel::message::{Channel, Header, KernelMessage};
use crate::kernel::session::{KernelSession, SessionFactory};
use crate::kernel::transport::KernelTransport;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use util::languages::KernelLanguage;

#[derive(Debug, Clone, PartialEq)]
pub enum Emit {
    Stream { name: String, text: String },
    Text(String),
    /// Base64-encoded PNG payload.
    Png(String),
    Error(String),
    /// Never send the closing `idle` status.
    Stall,
    /// Never send the `execute_reply`.
    NoReply,
    /// Reply with a message type other than `execute_reply`.
    WrongReply,
    /// Interleave messages parented to some other request.
    Noise,
    /// Leave out the opening `busy` status.
    NoBusy,
    /// Send no iopub events at all.
    Mute,
    /// Send a second `busy` after the input echo.
    DoubleBusy,
    /// Echo this code instead of the submitted code.
    WrongEcho(String),
}

impl Emit {
    pub fn stream(name: &str, text: &str) -> Self {
        Self::Stream {
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn error(text: &str) -> Self {
        Self::Error(text.to_string())
    }

    pub fn png(image: &DynamicImage) -> Result<Self, image::ImageError> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
        Ok(Self::Png(STANDARD.encode(bytes)))
    }
}

/// What the transport has seen, shared with the test that built it.
#[derive(Debug, Default)]
pub struct ScriptLog {
    pub requests: Vec<String>,
    pub shutdowns: usize,
}

type Script = Box<dyn FnMut(&str) -> Vec<Emit> + Send>;

pub struct ScriptedTransport {
    script: Script,
    replies: VecDeque<KernelMessage>,
    events: VecDeque<KernelMessage>,
    log: Arc<Mutex<ScriptLog>>,
}

impl ScriptedTransport {
    pub fn new(script: impl FnMut(&str) -> Vec<Emit> + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            replies: VecDeque::new(),
            events: VecDeque::new(),
            log: Arc::new(Mutex::new(ScriptLog::default())),
        }
    }

    /// A toy interpreter understanding just enough R-ish lines for tests:
    ///
    /// * `name = value` / `name <- value` assigns silently;
    /// * `name` prints `[1] value`;
    /// * `cat(text)` writes `text` to stdout;
    /// * `plot(r, g, b)` displays a 20x20 image of that colour;
    /// * `stop(msg)` raises `Error: msg`;
    /// * anything else raises `Error: object '<line>' not found`.
    ///
    /// Lines after an error are not run.
    pub fn toy_r() -> Self {
        let mut env: HashMap<String, String> = HashMap::new();
        Self::new(move |code: &str| {
            let mut emits = Vec::new();
            for line in code.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(arg) = call_arg(line, "cat") {
                    emits.push(Emit::stream("stdout", arg));
                } else if let Some(arg) = call_arg(line, "stop") {
                    emits.push(Emit::error(&format!("Error: {arg}")));
                    break;
                } else if let Some(arg) = call_arg(line, "plot") {
                    match solid_png(arg) {
                        Some(emit) => emits.push(emit),
                        None => {
                            emits.push(Emit::error("Error: invalid colour"));
                            break;
                        }
                    }
                } else if let Some((name, value)) =
                    line.split_once("<-").or_else(|| line.split_once('='))
                {
                    env.insert(name.trim().to_string(), value.trim().to_string());
                } else if let Some(value) = env.get(line) {
                    emits.push(Emit::text(&format!("[1] {value}")));
                } else {
                    emits.push(Emit::error(&format!("Error: object '{line}' not found")));
                    break;
                }
            }
            emits
        })
    }

    pub fn log(&self) -> Arc<Mutex<ScriptLog>> {
        Arc::clone(&self.log)
    }

    fn respond(&mut self, request: &KernelMessage, code: &str) {
        let emits = (self.script)(code);
        let has = |wanted: &Emit| emits.iter().any(|e| e == wanted);
        let failed = emits.iter().any(|e| matches!(e, Emit::Error(_)));

        if has(&Emit::Noise) {
            let mut stranger = request.clone();
            stranger.header = Header::new("execute_request", &request.header.session);
            self.replies.push_back(stranger.reply(
                Channel::Shell,
                "execute_reply",
                json!({ "status": "ok" }),
            ));
            self.events.push_back(stranger.reply(
                Channel::IoPub,
                "stream",
                json!({ "name": "stdout", "text": "not yours" }),
            ));
        }

        if has(&Emit::WrongReply) {
            self.replies
                .push_back(request.reply(Channel::Shell, "kernel_info_reply", json!({})));
        } else if !has(&Emit::NoReply) {
            let status = if failed { "error" } else { "ok" };
            self.replies.push_back(request.reply(
                Channel::Shell,
                "execute_reply",
                json!({ "status": status }),
            ));
        }

        if has(&Emit::Mute) {
            return;
        }
        if !has(&Emit::NoBusy) {
            self.events.push_back(request.status("busy"));
        }
        let echoed = emits
            .iter()
            .find_map(|e| match e {
                Emit::WrongEcho(other) => Some(other.as_str()),
                _ => None,
            })
            .unwrap_or(code);
        self.events.push_back(request.reply(
            Channel::IoPub,
            "execute_input",
            json!({ "code": echoed }),
        ));
        if has(&Emit::DoubleBusy) {
            self.events.push_back(request.status("busy"));
        }
        for emit in &emits {
            let event = match emit {
                Emit::Stream { name, text } => request.reply(
                    Channel::IoPub,
                    "stream",
                    json!({ "name": name, "text": text }),
                ),
                Emit::Text(text) => request.reply(
                    Channel::IoPub,
                    "execute_result",
                    json!({ "data": { "text/plain": text } }),
                ),
                Emit::Png(encoded) => request.reply(
                    Channel::IoPub,
                    "display_data",
                    json!({ "data": { "image/png": encoded, "text/plain": "plot" } }),
                ),
                Emit::Error(text) => request.reply(
                    Channel::IoPub,
                    "error",
                    json!({ "ename": "Error", "evalue": text, "traceback": [text] }),
                ),
                Emit::Stall
                | Emit::NoReply
                | Emit::WrongReply
                | Emit::Noise
                | Emit::NoBusy
                | Emit::Mute
                | Emit::DoubleBusy
                | Emit::WrongEcho(_) => continue,
            };
            self.events.push_back(event);
        }
        if !has(&Emit::Stall) {
            self.events.push_back(request.status("idle"));
        }
    }
}

fn call_arg<'a>(line: &'a str, function: &str) -> Option<&'a str> {
    line.strip_prefix(function)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn solid_png(arg: &str) -> Option<Emit> {
    let channels: Vec<u8> = arg
        .split(',')
        .map(|c| c.trim().parse().ok())
        .collect::<Option<_>>()?;
    let [r, g, b] = channels[..] else {
        return None;
    };
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([r, g, b])));
    Emit::png(&image).ok()
}

#[async_trait]
impl KernelTransport for ScriptedTransport {
    async fn send(&mut self, message: KernelMessage) -> Result<(), KernelError> {
        let Some(request) = message.as_execute_request() else {
            return Err(KernelError::ProtocolDesync(format!(
                "scripted kernel cannot handle {}",
                message.msg_type()
            )));
        };
        if let Ok(mut log) = self.log.lock() {
            log.requests.push(request.code.clone());
        }
        self.respond(&message, &request.code);
        Ok(())
    }

    async fn recv_reply(&mut self, _wait: Duration) -> Result<Option<KernelMessage>, KernelError> {
        Ok(self.replies.pop_front())
    }

    async fn recv_event(&mut self, _wait: Duration) -> Result<Option<KernelMessage>, KernelError> {
        Ok(self.events.pop_front())
    }

    async fn shutdown(&mut self) -> Result<(), KernelError> {
        if let Ok(mut log) = self.log.lock() {
            log.shutdowns += 1;
        }
        Ok(())
    }
}

/// Opens a fresh scripted session per call, with short protocol timeouts.
pub struct ScriptedSessions<F> {
    make: F,
}

impl<F> ScriptedSessions<F>
where
    F: Fn() -> ScriptedTransport + Send + Sync,
{
    pub fn new(make: F) -> Self {
        Self { make }
    }
}

#[async_trait]
impl<F> SessionFactory for ScriptedSessions<F>
where
    F: Fn() -> ScriptedTransport + Send + Sync,
{
    async fn open(&self, language: KernelLanguage) -> Result<KernelSession, KernelError> {
        let config = ExecutionConfig {
            timeout_secs: 1,
            busy_timeout_ms: 50,
            poll_timeout_ms: 50,
            ..ExecutionConfig::default()
        };
        Ok(KernelSession::with_transport(
            Box::new((self.make)()),
            language,
            config,
        ))
    }
}
