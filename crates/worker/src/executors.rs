//! 任务执行器
//!
//! 任务内容默认交给 shell 执行；以 `@名称 参数...` 开头的内容表示执行
//! 资源目录中的同名脚本，脚本通过标准输入传给 shell。

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_domain::entities::Task;
use fleet_errors::{FleetError, FleetResult};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::assets::AssetLoader;

/// 一次执行的结果，`error` 为空表示执行成功
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub output: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> FleetResult<ExecutionOutcome>;
}

pub struct ShellExecutor {
    shell: String,
    assets: Option<Arc<dyn AssetLoader>>,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            assets: None,
            timeout: None,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetLoader>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 构建命令及需要写入标准输入的内容
    async fn prepare(&self, content: &str) -> FleetResult<(Command, Option<Vec<u8>>)> {
        let mut cmd = Command::new(&self.shell);

        match content.trim_start().strip_prefix('@') {
            Some(invocation) => {
                let mut parts = invocation.split_whitespace();
                let name = parts
                    .next()
                    .ok_or_else(|| FleetError::validation_error("资源调用缺少名称"))?;
                let assets = self
                    .assets
                    .as_ref()
                    .ok_or_else(|| FleetError::config_error("未配置资源目录，无法执行资源脚本"))?;
                let script = assets.load(name).await?;

                cmd.arg("-s").arg("--").args(parts);
                Ok((cmd, Some(script)))
            }
            None => {
                cmd.arg("-c").arg(content);
                Ok((cmd, None))
            }
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(&self, task: &Task) -> FleetResult<ExecutionOutcome> {
        let (mut cmd, stdin_data) = self.prepare(&task.content).await?;
        cmd.stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        info!("执行任务 {} (作业 {})", task.id, task.job_id);
        let started_at = Utc::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| FleetError::Internal(format!("启动Shell命令失败: {e}")))?;

        if let (Some(data), Some(mut stdin)) = (stdin_data, child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&data).await {
                    warn!("写入脚本内容失败: {}", e);
                }
            });
        }

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("任务 {} 执行超时 ({:?})", task.id, limit);
                    return Ok(ExecutionOutcome {
                        output: String::new(),
                        error: Some(format!("执行超时: {limit:?}")),
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| FleetError::Internal(format!("等待进程结束失败: {e}")))?;
        let finished_at = Utc::now();

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let error = if output.status.success() {
            None
        } else if !stderr.is_empty() {
            Some(stderr)
        } else {
            Some(format!("命令执行失败，退出码: {:?}", output.status.code()))
        };

        debug!(
            "任务 {} 执行结束: success={}, 耗时 {}ms",
            task.id,
            error.is_none(),
            (finished_at - started_at).num_milliseconds()
        );

        Ok(ExecutionOutcome {
            output: stdout,
            error,
            started_at,
            finished_at,
        })
    }
}
