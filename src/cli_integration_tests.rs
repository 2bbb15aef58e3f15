use clap::Parser;
use fleet_core::AppConfig;
use tempfile::TempDir;

use crate::app::Application;
use crate::cli::{self, Cli, Command, JobCommand};

async fn app() -> anyhow::Result<(TempDir, Application)> {
    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", dir.path().join("cli.db").display());
    let app = Application::new(config).await?;
    Ok((dir, app))
}

async fn run(app: &Application, args: &[&str]) -> anyhow::Result<serde_json::Value> {
    let cli = Cli::try_parse_from(std::iter::once("fleet").chain(args.iter().copied()))?;
    cli::execute(app, cli.command).await
}

/// 命令行参数解析
#[test]
fn test_argument_parsing() {
    let cli = Cli::try_parse_from([
        "fleet", "-c", "fleet.toml", "job", "create", "--name", "n", "--content", "uptime",
        "--tag", "1", "--tag", "2", "--after", "7",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some("fleet.toml"));
    match cli.command {
        Command::Job(JobCommand::Create { tags, after, .. }) => {
            assert_eq!(tags, vec![1, 2]);
            assert_eq!(after, Some(7));
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["fleet", "task", "list", "--job", "1", "--target", "2"]).is_err());
    assert!(Cli::try_parse_from(["fleet", "--log-format", "xml", "migrate"]).is_err());
}

/// 集成测试：运维命令在临时数据库上的完整流程
#[tokio::test]
async fn test_operator_workflow() -> anyhow::Result<()> {
    let (_dir, app) = app().await?;

    let tags = run(&app, &["tag", "create", "linux", "prod", "linux"]).await?;
    assert_eq!(tags.as_array().map(Vec::len), Some(2));

    let target = run(
        &app,
        &["target", "add", "--name", "web", "--ip", "10.0.0.1", "--tag", "1", "--tag", "2"],
    )
    .await?;
    assert_eq!(target["tag_ids"], serde_json::json!([1, 2]));

    let job = run(
        &app,
        &["job", "create", "--name", "hi", "--content", "echo hi", "--tag", "1", "--tag", "2"],
    )
    .await?;
    assert_eq!(job["tasks"].as_array().map(Vec::len), Some(1));

    let shown = run(&app, &["job", "show", "1"]).await?;
    assert!(shown["prev"].is_null());
    assert_eq!(shown["tasks"][0]["state"], "QUEUED");

    run(&app, &["credential", "add", "1", "root", "toor"]).await?;
    let fails = run(&app, &["credential", "fail", "1"]).await?;
    assert_eq!(fails["fails"], 1);

    let key = run(&app, &["keygen"]).await?;
    let public_key = key["public_key"].as_str().unwrap().to_string();
    let identity = run(&app, &["identity", "register", &public_key, "--target", "1"]).await?;
    assert_eq!(identity["target_id"], 1);
    assert_eq!(identity["service"], "fleet-agent");

    assert!(run(&app, &["target", "show", "99"]).await.is_err());
    app.close().await;
    Ok(())
}
