//! # Code Runner
//!
//! Executes notebook chunks against a live interpreter and records what came
//! back.
//!
//! - [`kernel`]: the interpreter protocol driver ([`KernelSession`]).
//! - [`chunk_runner`]: runs a document's chunks in order and builds an
//!   [`ExecutionReport`], honouring stop-on-error.
//! - [`execution_config`]: timeouts and the bridge command line.

pub mod chunk_runner;
pub mod error;
pub mod execution_config;
pub mod kernel;

pub use chunk_runner::{ChunkOutcome, ChunkRunner, ExecutionReport, ExecutionResult, Outcome};
pub use error::{KernelError, RunnerError};
pub use execution_config::ExecutionConfig;
pub use kernel::{ExecuteOptions, KernelSession, SessionFactory};

use notebook::Notebook;
use util::languages::KernelLanguage;

/// Open a session for `language`, run the notebook's chunks for that
/// language, and close the session again.
pub async fn run_notebook(
    notebook: &Notebook,
    language: KernelLanguage,
    sessions: &dyn SessionFactory,
    stop_on_error: bool,
) -> Result<ExecutionReport, KernelError> {
    let mut session = sessions.open(language).await?;
    let chunks = notebook.chunks_in(language.chunk_languages());
    let report = ChunkRunner::new(chunks, &mut session)
        .stop_on_error(stop_on_error)
        .into_report()
        .await;
    session.close().await?;
    Ok(report)
}
