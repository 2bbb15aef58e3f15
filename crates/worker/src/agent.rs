//! Agent 主循环：签名轮询认领、执行、回传结果

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleet_auth::{KeySource, Signer};
use fleet_core::{AgentConfig, KeySourceKind};
use fleet_domain::{
    entities::{Task, TaskState},
    value_objects::{ClaimTasksRequest, SubmitTaskResultRequest},
};
use fleet_errors::{FleetError, FleetResult};
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::client::ControlPlane;
use crate::executors::TaskExecutor;
use crate::host::HostInfo;

/// 按配置选择密钥来源
pub fn key_source(config: &AgentConfig) -> KeySource {
    match config.key_source {
        KeySourceKind::Provided => KeySource::Provided(config.key.clone().unwrap_or_default()),
        KeySourceKind::Environment => KeySource::Environment(config.key_env_var.clone()),
        KeySourceKind::Ephemeral => KeySource::Ephemeral,
    }
}

/// 单轮轮询的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub claimed: usize,
    pub submitted: usize,
    pub failed: usize,
}

/// 结果回传的重试策略：只对可重试错误退避重试
#[derive(Debug, Clone, Copy)]
pub struct SubmitRetry {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 指数退避倍数
    pub backoff_multiplier: u32,
}

impl Default for SubmitRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2,
        }
    }
}

impl SubmitRetry {
    /// 第 `attempt` 次失败后的等待时间，从 1 开始计数
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub struct Agent {
    signer: Signer,
    control_plane: Arc<dyn ControlPlane>,
    executor: Arc<dyn TaskExecutor>,
    filter: ClaimTasksRequest,
    poll_interval: Duration,
    submit_retry: SubmitRetry,
}

impl Agent {
    pub fn new(
        signer: Signer,
        control_plane: Arc<dyn ControlPlane>,
        executor: Arc<dyn TaskExecutor>,
        host: &HostInfo,
        poll_interval: Duration,
    ) -> Self {
        Self {
            signer,
            control_plane,
            executor,
            filter: host.to_claim_request(),
            poll_interval,
            submit_retry: SubmitRetry::default(),
        }
    }

    pub fn with_submit_retry(mut self, submit_retry: SubmitRetry) -> Self {
        self.submit_retry = submit_retry;
        self
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// 认领并执行当前所有排队任务
    pub async fn poll_once(&self) -> FleetResult<PollSummary> {
        let tasks = self
            .control_plane
            .claim_tasks(&self.signer.sign_request(), &self.filter)
            .await?;

        let mut summary = PollSummary {
            claimed: tasks.len(),
            ..Default::default()
        };
        if tasks.is_empty() {
            debug!("没有可认领的任务");
            return Ok(summary);
        }
        info!("认领到 {} 个任务", tasks.len());

        for task in &tasks {
            match self.run_task(task).await {
                Ok(()) => summary.submitted += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("任务 {} 结果回传失败: {}", task.id, e);
                }
            }
        }
        Ok(summary)
    }

    async fn run_task(&self, task: &Task) -> FleetResult<()> {
        let result = match self.executor.execute(task).await {
            Ok(outcome) => {
                let mut result = SubmitTaskResultRequest::new(task.id, outcome.output)
                    .with_execution_window(outcome.started_at, outcome.finished_at);
                result.error = outcome.error;
                result
            }
            Err(e) => {
                warn!("任务 {} 无法执行: {}", task.id, e);
                let now = Utc::now();
                SubmitTaskResultRequest::new(task.id, "")
                    .with_error(e.to_string())
                    .with_execution_window(now, now)
            }
        };

        self.submit_with_retry(&result).await
    }

    /// 任务已被本 agent 认领，回传失败会让它永远停在 `Claimed`，
    /// 所以可重试错误按退避重试；状态与认证错误立即返回
    async fn submit_with_retry(&self, result: &SubmitTaskResultRequest) -> FleetResult<()> {
        let mut attempt = 1;
        loop {
            // 每次调用重新签名
            let outcome = self
                .control_plane
                .submit_task_result(&self.signer.sign_request(), result)
                .await;

            match outcome {
                Ok(_) => return Ok(()),
                // 前一次尝试实际已提交
                Err(FleetError::InvalidTransition { ref state, .. })
                    if attempt > 1 && state == TaskState::Completed.as_str() =>
                {
                    debug!("任务 {} 的结果已在先前的尝试中提交", result.id);
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < self.submit_retry.max_attempts => {
                    let delay = self.submit_retry.delay_after(attempt);
                    warn!(
                        "任务 {} 结果回传失败 (第 {} 次), {:?} 后重试: {}",
                        result.id, attempt, delay, e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 按间隔轮询直到收到关闭信号
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        if self.signer.is_ephemeral() {
            warn!(
                "使用临时密钥运行, 公钥 {} 需要登记并绑定目标后才能认领任务",
                self.signer.identity()
            );
        }
        info!("Agent 启动, 轮询间隔 {:?}", self.poll_interval);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(_) => {}
                        Err(FleetError::Auth(reason)) => warn!("认领被拒绝: {}", reason),
                        Err(e) if e.is_retryable() => warn!("控制平面暂不可用: {}", e),
                        Err(e) => error!("轮询失败: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Agent 收到关闭信号，停止轮询");
                    break;
                }
            }
        }
    }
}
