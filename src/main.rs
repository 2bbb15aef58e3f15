use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fleet::app::Application;
use fleet::cli::{self, Cli, Command};
use fleet::shutdown::ShutdownManager;
use fleet_core::{init_logging, AppConfig, LogFormat};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.observability.log_format = format.clone();
    }

    let log_format: LogFormat = config
        .observability
        .log_format
        .parse()
        .context("解析日志格式失败")?;
    init_logging(&config.observability.log_level, log_format)?;

    let app = Application::new(config).await?;

    let outcome = match cli.command {
        Command::Agent => run_agent(&app).await,
        command => match cli::execute(&app, command).await {
            Ok(value) => {
                println!("{}", cli::render(&value)?);
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    app.close().await;
    outcome
}

async fn run_agent(app: &Application) -> Result<()> {
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;

    let agent_run = app.run_agent(shutdown_rx);
    tokio::pin!(agent_run);

    tokio::select! {
        result = &mut agent_run => return result,
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
        }
    }

    match tokio::time::timeout(Duration::from_secs(30), agent_run).await {
        Ok(result) => {
            info!("Agent 已退出");
            result
        }
        Err(_) => {
            warn!("Agent 关闭超时，强制退出");
            Ok(())
        }
    }
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
