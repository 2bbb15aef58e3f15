//! 故障注入用的仓储包装

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_domain::entities::Task;
use fleet_domain::repositories::TaskRepository;
use fleet_domain::value_objects::{NewTask, SubmitTaskResultRequest};
use fleet_errors::{FleetError, FleetResult};

/// 对指定目标的任务创建返回 `Unavailable`，其余调用透传给内部仓储
///
/// 也可以让每次任务创建在写入前或写入后停顿，模拟慢存储。
pub struct FaultyTaskRepository {
    inner: Arc<dyn TaskRepository>,
    failing_targets: HashSet<i64>,
    create_attempts: AtomicUsize,
    delay_before_write: Option<Duration>,
    delay_after_write: Option<Duration>,
}

impl FaultyTaskRepository {
    pub fn new(inner: Arc<dyn TaskRepository>) -> Self {
        Self {
            inner,
            failing_targets: HashSet::new(),
            create_attempts: AtomicUsize::new(0),
            delay_before_write: None,
            delay_after_write: None,
        }
    }

    /// 写入前停顿，超时取消时任务不会落库
    pub fn slow_before_write(mut self, delay: Duration) -> Self {
        self.delay_before_write = Some(delay);
        self
    }

    /// 写入提交后停顿(创建、认领、完成)，超时取消时改动已经落库
    pub fn slow_after_write(mut self, delay: Duration) -> Self {
        self.delay_after_write = Some(delay);
        self
    }

    pub fn failing_for(mut self, target_id: i64) -> Self {
        self.failing_targets.insert(target_id);
        self
    }

    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    async fn after_write(&self) {
        if let Some(delay) = self.delay_after_write {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TaskRepository for FaultyTaskRepository {
    async fn create(&self, task: &NewTask) -> FleetResult<Task> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_targets.contains(&task.target_id) {
            return Err(FleetError::unavailable(format!(
                "注入故障: 目标 {} 的任务写入失败",
                task.target_id
            )));
        }
        if let Some(delay) = self.delay_before_write {
            tokio::time::sleep(delay).await;
        }
        let created = self.inner.create(task).await?;
        self.after_write().await;
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Task>> {
        self.inner.get_by_id(id).await
    }

    async fn list(&self) -> FleetResult<Vec<Task>> {
        self.inner.list().await
    }

    async fn list_by_job(&self, job_id: i64) -> FleetResult<Vec<Task>> {
        self.inner.list_by_job(job_id).await
    }

    async fn list_by_target(&self, target_id: i64) -> FleetResult<Vec<Task>> {
        self.inner.list_by_target(target_id).await
    }

    async fn claim(&self, id: i64, claim_time: DateTime<Utc>) -> FleetResult<Option<Task>> {
        let claimed = self.inner.claim(id, claim_time).await?;
        self.after_write().await;
        Ok(claimed)
    }

    async fn claim_queued_for_target(
        &self,
        target_id: i64,
        claim_time: DateTime<Utc>,
    ) -> FleetResult<Vec<Task>> {
        let claimed = self
            .inner
            .claim_queued_for_target(target_id, claim_time)
            .await?;
        self.after_write().await;
        Ok(claimed)
    }

    async fn complete(
        &self,
        result: &SubmitTaskResultRequest,
        completed_time: DateTime<Utc>,
    ) -> FleetResult<Option<Task>> {
        let completed = self.inner.complete(result, completed_time).await?;
        self.after_write().await;
        Ok(completed)
    }

    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        self.inner.add_tags(id, tag_ids).await
    }

    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        self.inner.remove_tags(id, tag_ids).await
    }
}
