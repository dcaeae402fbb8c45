use crate::error::RunnerError;
use crate::kernel::{ExecuteOptions, KernelSession, OutputEvent};
use chrono::{DateTime, Utc};
use notebook::Chunk;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What happened when a chunk was (or was not) sent to the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChunkOutcome {
    Ran { outputs: Vec<OutputEvent> },
    /// The execute call itself failed (timeout, desync); outputs are unknown.
    Aborted { reason: String },
    /// Not run because an earlier chunk failed under stop-on-error.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub chunk: Chunk,
    pub outcome: ChunkOutcome,
}

impl ExecutionResult {
    /// Outputs to score against. `None` for a skipped chunk; an aborted
    /// chunk has no usable outputs.
    pub fn outputs(&self) -> Option<&[OutputEvent]> {
        match &self.outcome {
            ChunkOutcome::Ran { outputs } => Some(outputs),
            ChunkOutcome::Aborted { .. } => Some(&[]),
            ChunkOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Skipped)
    }

    /// Error texts from this chunk, including the abort reason.
    pub fn errors(&self) -> Vec<&str> {
        match &self.outcome {
            ChunkOutcome::Ran { outputs } => outputs
                .iter()
                .filter(|o| o.is_error())
                .filter_map(|o| o.text())
                .collect(),
            ChunkOutcome::Aborted { reason } => vec![reason.as_str()],
            ChunkOutcome::Skipped => Vec::new(),
        }
    }

    pub fn failed(&self) -> bool {
        match &self.outcome {
            ChunkOutcome::Ran { outputs } => outputs.iter().any(|o| o.is_error()),
            ChunkOutcome::Aborted { .. } => true,
            ChunkOutcome::Skipped => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub results: Vec<ExecutionResult>,
    pub outcome: Outcome,
    pub message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }

    /// Escalate a failed run for callers that need every chunk to succeed.
    pub fn ensure_ok(&self) -> Result<&Self, RunnerError> {
        match self.outcome {
            Outcome::Ok => Ok(self),
            Outcome::Error => Err(RunnerError::ExecutionFailed(
                self.message.clone().unwrap_or_default(),
            )),
        }
    }
}

/// Runs chunks in order against one session, once.
pub struct ChunkRunner<'s> {
    chunks: Vec<Chunk>,
    session: &'s mut KernelSession,
    stop_on_error: bool,
    report: Option<ExecutionReport>,
}

impl<'s> ChunkRunner<'s> {
    pub fn new(chunks: Vec<Chunk>, session: &'s mut KernelSession) -> Self {
        Self {
            chunks,
            session,
            stop_on_error: true,
            report: None,
        }
    }

    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// The report, computed on first call and cached afterwards.
    pub async fn report(&mut self) -> &ExecutionReport {
        let report = match self.report.take() {
            Some(report) => report,
            None => self.run().await,
        };
        self.report.insert(report)
    }

    pub async fn into_report(mut self) -> ExecutionReport {
        match self.report.take() {
            Some(report) => report,
            None => self.run().await,
        }
    }

    async fn run(&mut self) -> ExecutionReport {
        let mut results = Vec::with_capacity(self.chunks.len());
        let mut diagnostics = Vec::new();
        let mut failed = false;

        for chunk in &self.chunks {
            if failed && self.stop_on_error {
                results.push(ExecutionResult {
                    chunk: chunk.clone(),
                    outcome: ChunkOutcome::Skipped,
                });
                continue;
            }

            let options = ExecuteOptions {
                stop_on_error: self.stop_on_error,
                ..ExecuteOptions::default()
            };
            let outcome = match self.session.execute(&chunk.code, options).await {
                Ok(outputs) => ChunkOutcome::Ran { outputs },
                Err(e) => {
                    warn!("Chunk at line {} aborted: {}", chunk.start_line, e);
                    ChunkOutcome::Aborted {
                        reason: e.to_string(),
                    }
                }
            };
            let result = ExecutionResult {
                chunk: chunk.clone(),
                outcome,
            };

            if result.failed() {
                failed = true;
                diagnostics.push(diagnostic(chunk, &result.errors()));
            }
            results.push(result);
        }

        info!(
            "Ran {} chunks, {} failed",
            results.len(),
            diagnostics.len()
        );

        ExecutionReport {
            results,
            outcome: if failed { Outcome::Error } else { Outcome::Ok },
            message: (!diagnostics.is_empty()).then(|| diagnostics.join("\n")),
            executed_at: Utc::now(),
        }
    }
}

fn diagnostic(chunk: &Chunk, errors: &[&str]) -> String {
    format!(
        "Errors for chunk at line no {}:\n----\n{}\n---\n{}\n",
        chunk.start_line,
        chunk.code,
        errors.join("\nError:\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_config::ExecutionConfig;
    use crate::kernel::OutputKind;
    use crate::kernel::scripted::{Emit, ScriptedSessions, ScriptedTransport};
    use notebook::parser::extract;
    use util::languages::KernelLanguage;

    fn session(transport: ScriptedTransport) -> KernelSession {
        let config = ExecutionConfig {
            busy_timeout_ms: 50,
            poll_timeout_ms: 50,
            ..ExecutionConfig::default()
        };
        KernelSession::with_transport(Box::new(transport), KernelLanguage::R, config)
    }

    #[tokio::test]
    async fn test_single_chunk_prints_value() {
        let chunks = extract("```{r}\na = 1\na\n```");
        let mut session = session(ScriptedTransport::toy_r());
        let mut runner = ChunkRunner::new(chunks, &mut session);
        let report = runner.report().await;

        assert_eq!(report.outcome, Outcome::Ok);
        assert!(report.message.is_none());
        assert_eq!(report.results.len(), 1);
        let outputs = report.results[0].outputs().unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, OutputKind::Text);
        assert_eq!(outputs[0].text(), Some("[1] 1"));
    }

    #[tokio::test]
    async fn test_stop_on_error_skips_the_rest() {
        let doc = "```{r}\na = 1\n```\n\n```{r}\nb\n```\n\n```{r}\na\n```\n";
        let transport = ScriptedTransport::toy_r();
        let log = transport.log();
        let mut session = session(transport);
        let report = ChunkRunner::new(extract(doc), &mut session)
            .into_report()
            .await;

        assert_eq!(report.outcome, Outcome::Error);
        assert!(!report.results[1].is_skipped());
        assert!(report.results[2].is_skipped());
        assert!(report.results[2].outputs().is_none());
        // The skipped chunk never reached the interpreter.
        assert_eq!(log.lock().unwrap().requests.len(), 2);

        let message = report.message.as_deref().unwrap();
        assert_eq!(
            message,
            "Errors for chunk at line no 6:\n----\nb\n---\nError: object 'b' not found\n"
        );
        assert!(matches!(
            report.ensure_ok(),
            Err(RunnerError::ExecutionFailed(m)) if m == message
        ));
    }

    #[tokio::test]
    async fn test_without_stop_on_error_runs_everything() {
        let doc = "```{r}\nx\n```\n```{r}\ny\n```\n```{r}\nz = 2\nz\n```\n";
        let mut session = session(ScriptedTransport::toy_r());
        let report = ChunkRunner::new(extract(doc), &mut session)
            .stop_on_error(false)
            .into_report()
            .await;

        assert_eq!(report.outcome, Outcome::Error);
        assert!(report.results.iter().all(|r| !r.is_skipped()));
        assert_eq!(report.results[2].outputs().unwrap()[0].text(), Some("[1] 2"));
        let message = report.message.unwrap();
        assert_eq!(message.matches("Errors for chunk").count(), 2);
        assert!(message.contains("not found\n\nErrors for chunk at line no 5"));
    }

    #[tokio::test]
    async fn test_aborted_chunk_fails_the_report() {
        let transport = ScriptedTransport::new(|code: &str| {
            if code == "slow" { vec![Emit::Stall] } else { Vec::new() }
        });
        let mut session = session(transport);
        let doc = "```{r}\nslow\n```\n```{r}\nfast\n```\n";
        let report = ChunkRunner::new(extract(doc), &mut session)
            .into_report()
            .await;

        assert!(matches!(report.results[0].outcome, ChunkOutcome::Aborted { .. }));
        assert_eq!(report.results[0].outputs().map(|o| o.len()), Some(0));
        assert!(report.results[1].is_skipped());
        assert!(report.message.unwrap().contains("idle status"));
    }

    #[tokio::test]
    async fn test_report_is_cached() {
        let transport = ScriptedTransport::toy_r();
        let log = transport.log();
        let mut session = session(transport);
        let mut runner = ChunkRunner::new(extract("```{r}\na = 1\n```\n"), &mut session);
        let first = runner.report().await.executed_at;
        let second = runner.report().await.executed_at;
        assert_eq!(first, second);
        assert_eq!(log.lock().unwrap().requests.len(), 1);
    }

    #[tokio::test]
    async fn test_run_notebook_filters_language_and_closes() {
        let sessions = ScriptedSessions::new(ScriptedTransport::toy_r);
        let nb = notebook::Notebook::parse(
            "```{python}\nprint('x')\n```\n\n```{r}\ncat(hi)\nplot(1, 2, 3)\n```\n",
        );
        let report = crate::run_notebook(&nb, KernelLanguage::R, &sessions, true)
            .await
            .unwrap();
        assert!(report.is_ok());
        assert_eq!(report.results.len(), 1);
        let kinds: Vec<OutputKind> = report.results[0]
            .outputs()
            .unwrap()
            .iter()
            .map(|o| o.kind)
            .collect();
        assert_eq!(kinds, vec![OutputKind::Stream, OutputKind::Image]);
    }

    #[tokio::test]
    async fn test_report_serde_round_trip() {
        let mut session = session(ScriptedTransport::toy_r());
        let report = ChunkRunner::new(extract("```{r}\nq = 3\nq\n```\n```{r}\nw\n```\n"), &mut session)
            .into_report()
            .await;
        let json = serde_json::to_string(&report).unwrap();
        let back: ExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.outcome, Outcome::Error);
        assert_eq!(back.results[0].outputs().unwrap()[0].text(), Some("[1] 3"));
        assert_eq!(back.results[1].errors(), report.results[1].errors());
    }
}
