//! Client side of the interpreter protocol.
//!
//! - [`message`]: wire layout of requests, replies and events.
//! - [`transport`]: the [`KernelTransport`] seam and the child-process bridge.
//! - [`output`]: decoding events into typed [`OutputEvent`]s.
//! - [`session`]: [`KernelSession`], which owns one interpreter.

pub mod message;
pub mod output;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod session;
pub mod transport;

pub use output::{OutputContent, OutputEvent, OutputKind, decode};
pub use session::{ExecuteOptions, KernelSession, SessionFactory};
pub use transport::{KernelTransport, ProcessTransport};
