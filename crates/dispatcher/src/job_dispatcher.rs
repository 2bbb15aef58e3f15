use std::sync::Arc;

use chrono::Utc;
use fleet_domain::{
    entities::{Job, Task},
    repositories::{JobRepository, TaskRepository},
    value_objects::{CreateJobRequest, NewTask},
};
use fleet_errors::{FanoutFailure, FleetError, FleetResult};
use fleet_infrastructure::TimeoutHandler;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::tag_resolver::TagResolver;

/// 扇出完成后的作业及其全部任务
#[derive(Debug, Clone)]
pub struct DispatchedJob {
    pub job: Job,
    pub tasks: Vec<Task>,
}

/// 作业扇出
///
/// 采用尽力而为策略：每个任务(行与标签关联)是独立事务，某个目标写入失败
/// 不回滚已创建的任务，调用方收到 `PartialFanout` 并据此针对失败目标重新下发。
///
/// 截止时间只作用于单次存储调用。作业行写入之后，结果总是 `DispatchedJob`
/// 或带有作业 id 的 `PartialFanout`，不会退化成匿名的 `Unavailable`。
pub struct JobDispatcher {
    resolver: TagResolver,
    job_repo: Arc<dyn JobRepository>,
    task_repo: Arc<dyn TaskRepository>,
    deadline: TimeoutHandler,
}

impl JobDispatcher {
    pub fn new(
        resolver: TagResolver,
        job_repo: Arc<dyn JobRepository>,
        task_repo: Arc<dyn TaskRepository>,
        deadline: TimeoutHandler,
    ) -> Self {
        Self {
            resolver,
            job_repo,
            task_repo,
            deadline,
        }
    }

    #[instrument(skip(self, request), fields(job_name = %request.name, tag_count = request.tag_ids.len()))]
    pub async fn create_job(&self, request: &CreateJobRequest) -> FleetResult<DispatchedJob> {
        if request.name.trim().is_empty() {
            return Err(FleetError::validation_error("作业名称不能为空"));
        }

        if let Some(prev_id) = request.prev_job_id {
            let prev = self
                .deadline
                .database_operation(self.job_repo.get_by_id(prev_id), "get_prev_job")
                .await?;
            if prev.is_none() {
                return Err(FleetError::job_not_found(prev_id));
            }
        }

        let targets = self
            .deadline
            .database_operation(self.resolver.resolve_targets(&request.tag_ids), "resolve_targets")
            .await?;

        // 作业创建时间与所有任务的入队时间共用同一个时间点
        let t0 = Utc::now();
        let job = self
            .deadline
            .database_operation(self.job_repo.create(request, t0), "create_job")
            .await?;
        info!(
            "创建作业 {} ({}), 匹配目标 {} 个",
            job.id,
            job.name,
            targets.len()
        );

        let mut tasks = Vec::with_capacity(targets.len());
        let mut failed = Vec::new();

        for target in &targets {
            let new_task = NewTask {
                job_id: job.id,
                target_id: target.id,
                content: job.content.clone(),
                queue_time: t0,
                tag_ids: job.tag_ids.clone(),
            };

            let created = self
                .deadline
                .database_operation(self.task_repo.create(&new_task), "create_task")
                .await;
            match created {
                Ok(task) => {
                    debug!("为目标 {} 创建任务 {}", target.id, task.id);
                    tasks.push(task);
                }
                Err(e) => {
                    warn!("为目标 {} 创建任务失败: {}", target.id, e);
                    failed.push(PendingFailure {
                        target_id: target.id,
                        retryable: e.is_retryable(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failed.iter().any(|f| f.retryable) {
            self.reconcile(job.id, &mut tasks, &mut failed).await;
        }

        if !failed.is_empty() {
            counter!("fleet_fanout_failures_total").increment(failed.len() as u64);
            warn!(
                "作业 {} 部分扇出失败: 成功 {} 个, 失败 {} 个",
                job.id,
                tasks.len(),
                failed.len()
            );
            return Err(FleetError::PartialFanout {
                job_id: job.id,
                created: tasks.len(),
                failed: failed
                    .into_iter()
                    .map(|f| FanoutFailure {
                        target_id: f.target_id,
                        reason: f.reason,
                    })
                    .collect(),
            });
        }

        Ok(DispatchedJob { job, tasks })
    }

    /// 超时的写入可能已经提交，按作业回读一次，把已落库的任务移回成功列表
    async fn reconcile(&self, job_id: i64, tasks: &mut Vec<Task>, failed: &mut Vec<PendingFailure>) {
        let stored = match self
            .deadline
            .database_operation(self.task_repo.list_by_job(job_id), "reconcile_fanout")
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!("作业 {} 扇出结果回读失败，按写入失败上报: {}", job_id, e);
                return;
            }
        };

        failed.retain(|f| {
            match stored.iter().find(|t| t.target_id == f.target_id) {
                Some(task) => {
                    debug!("目标 {} 的任务 {} 在超时后已提交", f.target_id, task.id);
                    tasks.push(task.clone());
                    false
                }
                None => true,
            }
        });
        tasks.sort_by_key(|t| t.id);
    }
}

struct PendingFailure {
    target_id: i64,
    retryable: bool,
    reason: String,
}
