//! 领域仓储抽象
//!
//! 实体存储对外暴露的窄接口。认领与提交必须实现为单条条件更新，
//! 不允许先读后写。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_errors::FleetResult;

use crate::entities::{Credential, Identity, Job, Tag, Target, Task};
use crate::value_objects::{
    ClaimTasksRequest, CreateJobRequest, NewTarget, NewTask, SubmitTaskResultRequest,
    TargetFieldsUpdate,
};

#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// 目标行与标签关联在同一事务内写入
    async fn create(&self, target: &NewTarget) -> FleetResult<Target>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Target>>;
    async fn list(&self) -> FleetResult<Vec<Target>>;
    async fn update_fields(&self, id: i64, update: &TargetFieldsUpdate) -> FleetResult<Target>;
    async fn delete(&self, id: i64) -> FleetResult<()>;
    /// 标签集合是 `tag_ids` 超集的目标；空列表返回空集合
    async fn find_with_all_tags(&self, tag_ids: &[i64]) -> FleetResult<Vec<Target>>;
    async fn find_by_host(&self, filter: &ClaimTasksRequest) -> FleetResult<Vec<Target>>;
    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    /// 名称重复时返回 `Conflict`
    async fn create(&self, name: &str) -> FleetResult<Tag>;
    /// 幂等：已存在的名称直接复用，输入内的重复只计一次
    async fn get_or_create_many(&self, names: &[String]) -> FleetResult<Vec<Tag>>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Tag>>;
    async fn get_by_name(&self, name: &str) -> FleetResult<Option<Tag>>;
    async fn list(&self) -> FleetResult<Vec<Tag>>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, request: &CreateJobRequest, created_at: DateTime<Utc>)
        -> FleetResult<Job>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Job>>;
    async fn list(&self) -> FleetResult<Vec<Job>>;
    /// 反查 `prev_id` 指向自身的作业
    async fn find_next(&self, id: i64) -> FleetResult<Option<Job>>;
    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 任务行与标签关联在同一事务内写入
    async fn create(&self, task: &NewTask) -> FleetResult<Task>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Task>>;
    async fn list(&self) -> FleetResult<Vec<Task>>;
    async fn list_by_job(&self, job_id: i64) -> FleetResult<Vec<Task>>;
    async fn list_by_target(&self, target_id: i64) -> FleetResult<Vec<Task>>;
    /// 仅当任务仍处于 `Queued` 时认领；返回 `None` 表示未认领成功
    async fn claim(&self, id: i64, claim_time: DateTime<Utc>) -> FleetResult<Option<Task>>;
    /// 认领目标下所有 `Queued` 任务
    async fn claim_queued_for_target(
        &self,
        target_id: i64,
        claim_time: DateTime<Utc>,
    ) -> FleetResult<Vec<Task>>;
    /// 仅当任务处于 `Claimed` 时完成；返回 `None` 表示未完成状态转换
    async fn complete(
        &self,
        result: &SubmitTaskResultRequest,
        completed_time: DateTime<Utc>,
    ) -> FleetResult<Option<Task>>;
    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn create(&self, target_id: i64, principal: &str, secret: &str)
        -> FleetResult<Credential>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Credential>>;
    async fn list(&self) -> FleetResult<Vec<Credential>>;
    async fn list_by_target(&self, target_id: i64) -> FleetResult<Vec<Credential>>;
    /// 原子自增失败计数，返回新值；凭据不存在时返回 `None`
    async fn increment_fails(&self, id: i64) -> FleetResult<Option<i64>>;
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// 同一公钥重复登记时覆盖服务名与目标绑定
    async fn register(
        &self,
        service: &str,
        public_key: &str,
        target_id: Option<i64>,
    ) -> FleetResult<Identity>;
    async fn find(&self, service: &str, public_key: &str) -> FleetResult<Option<Identity>>;
    async fn list(&self) -> FleetResult<Vec<Identity>>;
    async fn revoke(&self, public_key: &str) -> FleetResult<bool>;
}
