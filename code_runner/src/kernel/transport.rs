use crate::error::KernelError;
use crate::kernel::message::{Channel, KernelMessage};
use async_trait::async_trait;
use std::borrow::Cow;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Grace period for a bridge to exit after its stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Framing layer between a session and one interpreter.
///
/// Receive calls return `Ok(None)` when nothing arrived within `wait` and
/// [`KernelError::Disconnected`] once the interpreter is gone.
#[async_trait]
pub trait KernelTransport: Send {
    async fn send(&mut self, message: KernelMessage) -> Result<(), KernelError>;

    /// Next message on the shell channel.
    async fn recv_reply(&mut self, wait: Duration) -> Result<Option<KernelMessage>, KernelError>;

    /// Next message on the iopub channel.
    async fn recv_event(&mut self, wait: Duration) -> Result<Option<KernelMessage>, KernelError>;

    async fn shutdown(&mut self) -> Result<(), KernelError>;
}

/// Interpreter bridge running as a child process, speaking JSON lines on stdio.
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: UnboundedReceiver<KernelMessage>,
    events: UnboundedReceiver<KernelMessage>,
    tasks: Vec<JoinHandle<()>>,
}

impl ProcessTransport {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, KernelError> {
        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .map(|part| shell_escape::escape(Cow::from(part)).into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        let spawn_error = |source: std::io::Error| KernelError::Spawn {
            command: command_line.clone(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("stdout was not captured")))?;
        let stderr = child.stderr.take();

        info!("Started interpreter: {}", command_line);

        let (reply_tx, replies) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let mut tasks = vec![tokio::spawn(route_stdout(stdout, reply_tx, event_tx))];

        if let Some(stderr) = stderr {
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("interpreter stderr: {}", line);
                }
            }));
        }

        Ok(Self {
            child,
            stdin,
            replies,
            events,
            tasks,
        })
    }
}

/// Read JSON lines from the bridge and route them by channel.
async fn route_stdout(
    stdout: tokio::process::ChildStdout,
    replies: UnboundedSender<KernelMessage>,
    events: UnboundedSender<KernelMessage>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed reading interpreter output: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message: KernelMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring non-protocol line from interpreter ({}): {}", e, line);
                continue;
            }
        };
        let target = match message.channel {
            Channel::Shell => &replies,
            Channel::IoPub => &events,
        };
        if target.send(message).is_err() {
            break;
        }
    }
    debug!("Interpreter stdout closed");
}

async fn recv_within(
    rx: &mut UnboundedReceiver<KernelMessage>,
    wait: Duration,
    channel: &'static str,
) -> Result<Option<KernelMessage>, KernelError> {
    match timeout(wait, rx.recv()).await {
        Ok(Some(message)) => Ok(Some(message)),
        Ok(None) => Err(KernelError::Disconnected(channel)),
        Err(_) => Ok(None),
    }
}

#[async_trait]
impl KernelTransport for ProcessTransport {
    async fn send(&mut self, message: KernelMessage) -> Result<(), KernelError> {
        let stdin = self.stdin.as_mut().ok_or(KernelError::Closed)?;
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn recv_reply(&mut self, wait: Duration) -> Result<Option<KernelMessage>, KernelError> {
        recv_within(&mut self.replies, wait, "shell reply").await
    }

    async fn recv_event(&mut self, wait: Duration) -> Result<Option<KernelMessage>, KernelError> {
        recv_within(&mut self.events, wait, "iopub event").await
    }

    async fn shutdown(&mut self) -> Result<(), KernelError> {
        // Closing stdin asks the bridge to exit.
        drop(self.stdin.take());
        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Interpreter exited with {}", status),
            Ok(Err(e)) => warn!("Failed waiting for interpreter: {}", e),
            Err(_) => {
                warn!("Interpreter ignored shutdown, killing it");
                self.child.kill().await?;
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
