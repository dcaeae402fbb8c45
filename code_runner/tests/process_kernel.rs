#![cfg(unix)]

use code_runner::kernel::OutputKind;
use code_runner::{
    ExecuteOptions, ExecutionConfig, KernelError, KernelSession, Outcome, run_notebook,
};
use notebook::Notebook;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use util::languages::KernelLanguage;

/// A POSIX shell stand-in for an interpreter bridge.
///
/// Echoes `code` back as a text result, except `boom`, which raises.
const FAKE_BRIDGE: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"msg_id":"\([^"]*\)".*/\1/p')
  code=$(printf '%s' "$line" | sed -n 's/.*"code":"\([^"]*\)".*/\1/p')
  parent="{\"msg_id\":\"$id\",\"msg_type\":\"execute_request\",\"session\":\"\"}"
  echo "{\"channel\":\"iopub\",\"header\":{\"msg_id\":\"$id-1\",\"msg_type\":\"status\"},\"parent_header\":$parent,\"content\":{\"execution_state\":\"busy\"}}"
  echo "{\"channel\":\"iopub\",\"header\":{\"msg_id\":\"$id-2\",\"msg_type\":\"execute_input\"},\"parent_header\":$parent,\"content\":{\"code\":\"$code\"}}"
  if [ "$code" = "boom" ]; then
    echo "{\"channel\":\"iopub\",\"header\":{\"msg_id\":\"$id-3\",\"msg_type\":\"error\"},\"parent_header\":$parent,\"content\":{\"ename\":\"Error\",\"evalue\":\"boom\",\"traceback\":[]}}"
    status=error
  else
    echo "{\"channel\":\"iopub\",\"header\":{\"msg_id\":\"$id-3\",\"msg_type\":\"execute_result\"},\"parent_header\":$parent,\"content\":{\"data\":{\"text/plain\":\"echo:$code\"}}}"
    status=ok
  fi
  echo "{\"channel\":\"shell\",\"header\":{\"msg_id\":\"$id-4\",\"msg_type\":\"execute_reply\"},\"parent_header\":$parent,\"content\":{\"status\":\"$status\"}}"
  echo "{\"channel\":\"iopub\",\"header\":{\"msg_id\":\"$id-5\",\"msg_type\":\"status\"},\"parent_header\":$parent,\"content\":{\"execution_state\":\"idle\"}}"
done
"#;

fn bridge_config(dir: &Path) -> ExecutionConfig {
    let script = dir.join("bridge.sh");
    fs::write(&script, FAKE_BRIDGE).unwrap();
    ExecutionConfig {
        timeout_secs: 5,
        busy_timeout_ms: 2_000,
        poll_timeout_ms: 2_000,
        bridge: "sh".to_string(),
        bridge_args: vec![script.to_string_lossy().into_owned()],
    }
}

#[tokio::test]
async fn test_execute_over_child_process() {
    let dir = TempDir::new().unwrap();
    let mut session = KernelSession::open(KernelLanguage::R, bridge_config(dir.path()))
        .await
        .unwrap();

    let outputs = session
        .execute("print(1)", ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].kind, OutputKind::Text);
    assert_eq!(outputs[0].text(), Some("echo:print(1)"));

    let outputs = session.execute("boom", ExecuteOptions::default()).await.unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].kind, OutputKind::Error);
    assert_eq!(outputs[0].text(), Some("Error: boom"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_close_twice_then_execute() {
    let dir = TempDir::new().unwrap();
    let mut session = KernelSession::open(KernelLanguage::Python, bridge_config(dir.path()))
        .await
        .unwrap();
    session.close().await.unwrap();
    session.close().await.unwrap();
    let err = session.execute("x", ExecuteOptions::default()).await.unwrap_err();
    assert!(matches!(err, KernelError::Closed));
}

#[tokio::test]
async fn test_missing_bridge_fails_to_spawn() {
    let config = ExecutionConfig {
        bridge: "/definitely/not/a/kernel-bridge".to_string(),
        ..ExecutionConfig::default()
    };
    let err = KernelSession::open(KernelLanguage::R, config)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, KernelError::Spawn { .. }));
    assert!(err.to_string().contains("/definitely/not/a/kernel-bridge"));
}

#[tokio::test]
async fn test_run_notebook_stops_on_error() {
    let dir = TempDir::new().unwrap();
    let notebook = Notebook::parse(
        "# Demo\n\n```{r}\nfirst\n```\n\n```{python}\nignored\n```\n\n```{r}\nboom\n```\n\n```{r}\nlast\n```\n",
    );
    let config = bridge_config(dir.path());
    let report = run_notebook(&notebook, KernelLanguage::R, &config, true)
        .await
        .unwrap();

    assert_eq!(report.outcome, Outcome::Error);
    assert_eq!(report.results.len(), 3);
    assert_eq!(
        report.results[0].outputs().unwrap()[0].text(),
        Some("echo:first")
    );
    assert!(report.results[2].is_skipped());
    assert!(
        report
            .message
            .as_deref()
            .unwrap()
            .starts_with("Errors for chunk at line no 12:")
    );
}
