//! 任务认领与结果提交
//!
//! 状态机 `Queued -> Claimed -> Completed`。状态变更全部交给仓储的条件更新，
//! 条件未命中时再读取当前状态，只用于给出准确的错误。
//!
//! 截止时间只包住读操作。条件更新不被中途取消，由连接池的获取超时和
//! SQLite 的 busy_timeout 限时，失败时不会留下已认领却未返回的任务。

use std::sync::Arc;

use chrono::Utc;
use fleet_domain::{
    entities::{Target, Task, TaskState},
    repositories::{TargetRepository, TaskRepository},
    value_objects::{ClaimTasksRequest, SubmitTaskResultRequest},
};
use fleet_errors::{FleetError, FleetResult};
use fleet_infrastructure::TimeoutHandler;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

const SUBMIT_ACTION: &str = "提交结果";

pub struct TaskClaimService {
    task_repo: Arc<dyn TaskRepository>,
    target_repo: Arc<dyn TargetRepository>,
    deadline: TimeoutHandler,
}

impl TaskClaimService {
    pub fn new(
        task_repo: Arc<dyn TaskRepository>,
        target_repo: Arc<dyn TargetRepository>,
        deadline: TimeoutHandler,
    ) -> Self {
        Self {
            task_repo,
            target_repo,
            deadline,
        }
    }

    /// 解析认领过滤条件；条件之间为逻辑与
    pub async fn resolve_claim_targets(&self, filter: &ClaimTasksRequest) -> FleetResult<Vec<Target>> {
        if filter.is_empty() {
            return Err(FleetError::validation_error("认领过滤条件不能为空"));
        }

        let targets = self
            .deadline
            .database_operation(self.target_repo.find_by_host(filter), "find_claim_targets")
            .await?;
        if targets.is_empty() {
            return Err(FleetError::TargetNotFound(filter.describe()));
        }
        Ok(targets)
    }

    /// 认领调用方目标下所有排队任务，没有任务时返回空列表
    #[instrument(skip(self, filter), fields(caller_target = %caller_target))]
    pub async fn claim_tasks(
        &self,
        filter: &ClaimTasksRequest,
        caller_target: i64,
    ) -> FleetResult<Vec<Task>> {
        let targets = self.resolve_claim_targets(filter).await?;
        if !targets.iter().any(|t| t.id == caller_target) {
            warn!(
                "过滤条件 [{}] 未包含调用方绑定的目标 {}",
                filter.describe(),
                caller_target
            );
            return Err(FleetError::auth(format!(
                "调用方只能为目标 {caller_target} 认领任务"
            )));
        }

        self.claim_for_target(caller_target).await
    }

    pub async fn claim_for_target(&self, target_id: i64) -> FleetResult<Vec<Task>> {
        let tasks = self
            .task_repo
            .claim_queued_for_target(target_id, Utc::now())
            .await?;

        if tasks.is_empty() {
            debug!("目标 {} 没有排队任务", target_id);
        } else {
            counter!("fleet_tasks_claimed_total").increment(tasks.len() as u64);
            info!("目标 {} 认领了 {} 个任务", target_id, tasks.len());
        }
        Ok(tasks)
    }

    /// 按 id 认领单个任务；并发认领同一任务时只有一个调用成功
    #[instrument(skip(self), fields(task_id = %id, caller_target = %caller_target))]
    pub async fn claim_task(&self, id: i64, caller_target: i64) -> FleetResult<Task> {
        // 目标归属不会变化，先读再做条件更新不影响认领的原子性
        let current = self.owned_task(id, caller_target).await?;

        match self.task_repo.claim(id, Utc::now()).await? {
            Some(task) => {
                counter!("fleet_tasks_claimed_total").increment(1);
                info!("任务 {} 已被目标 {} 认领", id, caller_target);
                Ok(task)
            }
            None => Err(self.diagnose_claim_miss(current).await?),
        }
    }

    /// 仅允许从 `Claimed` 完成；重复提交被拒绝，不覆盖已有输出
    #[instrument(skip(self, result), fields(task_id = %result.id, caller_target = %caller_target))]
    pub async fn submit_result(
        &self,
        result: &SubmitTaskResultRequest,
        caller_target: i64,
    ) -> FleetResult<Task> {
        result.validate()?;
        self.owned_task(result.id, caller_target).await?;

        match self.task_repo.complete(result, Utc::now()).await? {
            Some(task) => {
                counter!("fleet_tasks_completed_total").increment(1);
                info!(
                    "任务 {} 已完成{}",
                    task.id,
                    if task.error.is_some() { " (执行出错)" } else { "" }
                );
                Ok(task)
            }
            None => {
                let state = self.current_state(result.id).await?;
                Err(FleetError::InvalidTransition {
                    task_id: result.id,
                    state: state.to_string(),
                    action: SUBMIT_ACTION,
                })
            }
        }
    }

    async fn owned_task(&self, id: i64, caller_target: i64) -> FleetResult<Task> {
        let task = self
            .deadline
            .database_operation(self.task_repo.get_by_id(id), "get_task")
            .await?
            .ok_or_else(|| FleetError::task_not_found(id))?;

        if task.target_id != caller_target {
            warn!(
                "目标 {} 试图操作属于目标 {} 的任务 {}",
                caller_target, task.target_id, id
            );
            return Err(FleetError::auth(format!(
                "任务 {id} 不属于目标 {caller_target}"
            )));
        }
        Ok(task)
    }

    async fn current_state(&self, id: i64) -> FleetResult<TaskState> {
        self.deadline
            .database_operation(self.task_repo.get_by_id(id), "get_task_state")
            .await?
            .map(|t| t.state)
            .ok_or_else(|| FleetError::task_not_found(id))
    }

    async fn diagnose_claim_miss(&self, before: Task) -> FleetResult<FleetError> {
        let state = self.current_state(before.id).await?;
        Ok(match state {
            TaskState::Claimed => FleetError::AlreadyClaimed { task_id: before.id },
            TaskState::Completed => FleetError::AlreadyCompleted { task_id: before.id },
            // 条件更新未命中但任务仍在排队，只可能是存储层异常
            TaskState::Queued => {
                FleetError::unavailable(format!("任务 {} 认领未生效，请重试", before.id))
            }
        })
    }
}
