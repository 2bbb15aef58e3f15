use std::sync::Arc;
use std::time::Duration;

use fleet_errors::FleetError;
use fleet_testing_utils::TaskBuilder;
use fleet_worker::{DirAssetLoader, ShellExecutor, TaskExecutor};

#[tokio::test]
async fn test_shell_content_output() {
    let executor = ShellExecutor::new();
    let task = TaskBuilder::new().with_content("echo hi").build();

    let outcome = executor.execute(&task).await.unwrap();
    assert_eq!(outcome.output, "hi\n");
    assert_eq!(outcome.error, None);
    assert!(outcome.finished_at >= outcome.started_at);
}

#[tokio::test]
async fn test_failing_command_reports_stderr() {
    let executor = ShellExecutor::new();
    let task = TaskBuilder::new()
        .with_content("echo partial; echo boom >&2; exit 3")
        .build();

    let outcome = executor.execute(&task).await.unwrap();
    assert_eq!(outcome.output, "partial\n");
    assert_eq!(outcome.error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_silent_failure_reports_exit_code() {
    let executor = ShellExecutor::new();
    let task = TaskBuilder::new().with_content("exit 7").build();

    let outcome = executor.execute(&task).await.unwrap();
    assert!(outcome.error.unwrap().contains('7'));
}

#[tokio::test]
async fn test_asset_script_runs_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greet.sh"), "echo \"hello $1\"\n").unwrap();

    let executor = ShellExecutor::new().with_assets(Arc::new(DirAssetLoader::new(dir.path())));
    let task = TaskBuilder::new().with_content("@greet.sh fleet").build();

    let outcome = executor.execute(&task).await.unwrap();
    assert_eq!(outcome.output, "hello fleet\n");
    assert_eq!(outcome.error, None);

    let missing = TaskBuilder::new().with_content("@nope.sh").build();
    assert!(matches!(
        executor.execute(&missing).await,
        Err(FleetError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_asset_invocation_without_loader_is_configuration_error() {
    let executor = ShellExecutor::new();
    let task = TaskBuilder::new().with_content("@greet.sh").build();
    assert!(matches!(
        executor.execute(&task).await,
        Err(FleetError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_timeout_is_reported_as_execution_error() {
    let executor = ShellExecutor::new().with_timeout(Duration::from_millis(200));
    let task = TaskBuilder::new().with_content("sleep 5").build();

    let outcome = executor.execute(&task).await.unwrap();
    assert!(outcome.error.unwrap().contains("超时"));
}
