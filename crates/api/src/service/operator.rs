use fleet_auth::decode_public_key;
use fleet_dispatcher::DispatchedJob;
use fleet_domain::{
    entities::{Credential, Identity, Job, Tag, Target, Task},
    value_objects::{CreateJobRequest, NewTarget, TargetFieldsUpdate},
};
use fleet_errors::{FleetError, FleetResult};
use tracing::{info, instrument};

use super::FleetService;

/// 运维操作面
impl FleetService {
    // ---- 作业 ----

    pub async fn create_job(&self, request: &CreateJobRequest) -> FleetResult<DispatchedJob> {
        self.dispatcher.create_job(request).await
    }

    pub async fn get_job(&self, id: i64) -> FleetResult<Job> {
        self.guarded("get_job", self.repos.jobs.get_by_id(id))
            .await?
            .ok_or_else(|| FleetError::job_not_found(id))
    }

    pub async fn list_jobs(&self) -> FleetResult<Vec<Job>> {
        self.guarded("list_jobs", self.repos.jobs.list()).await
    }

    /// 前驱作业，来自存储的 `prev_id`
    pub async fn job_prev(&self, id: i64) -> FleetResult<Option<Job>> {
        let job = self.get_job(id).await?;
        match job.prev_id {
            Some(prev_id) => self.guarded("job_prev", self.repos.jobs.get_by_id(prev_id)).await,
            None => Ok(None),
        }
    }

    /// 后继作业，按 `prev_id` 反查
    pub async fn job_next(&self, id: i64) -> FleetResult<Option<Job>> {
        self.get_job(id).await?;
        self.guarded("job_next", self.repos.jobs.find_next(id)).await
    }

    pub async fn tasks_of_job(&self, id: i64) -> FleetResult<Vec<Task>> {
        self.get_job(id).await?;
        self.guarded("tasks_of_job", self.repos.tasks.list_by_job(id))
            .await
    }

    pub async fn apply_tag_to_job(&self, job_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded("apply_tag_to_job", self.repos.jobs.add_tags(job_id, &[tag_id]))
            .await
    }

    pub async fn remove_tag_from_job(&self, job_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded(
            "remove_tag_from_job",
            self.repos.jobs.remove_tags(job_id, &[tag_id]),
        )
        .await
    }

    // ---- 目标 ----

    #[instrument(skip(self, target), fields(name = %target.name))]
    pub async fn create_target(&self, target: &NewTarget) -> FleetResult<Target> {
        target.validate()?;
        let created = self
            .guarded("create_target", self.repos.targets.create(target))
            .await?;
        info!("登记目标 {}", created.entity_description());
        Ok(created)
    }

    pub async fn set_target_fields(
        &self,
        id: i64,
        update: &TargetFieldsUpdate,
    ) -> FleetResult<Target> {
        update.validate()?;
        if update.is_empty() {
            return Err(FleetError::validation_error("没有需要更新的字段"));
        }
        self.guarded(
            "set_target_fields",
            self.repos.targets.update_fields(id, update),
        )
        .await
    }

    /// 删除目标时级联删除其任务、凭据与标签关联，已登记身份解除绑定
    pub async fn delete_target(&self, id: i64) -> FleetResult<()> {
        self.guarded("delete_target", self.repos.targets.delete(id))
            .await?;
        info!("目标 {} 已删除", id);
        Ok(())
    }

    pub async fn get_target(&self, id: i64) -> FleetResult<Target> {
        self.guarded("get_target", self.repos.targets.get_by_id(id))
            .await?
            .ok_or_else(|| FleetError::target_not_found(id))
    }

    pub async fn list_targets(&self) -> FleetResult<Vec<Target>> {
        self.guarded("list_targets", self.repos.targets.list()).await
    }

    pub async fn targets_with_tag(&self, tag_id: i64) -> FleetResult<Vec<Target>> {
        self.get_tag(tag_id).await?;
        self.guarded("targets_with_tag", self.resolver.resolve_targets(&[tag_id]))
            .await
    }

    pub async fn tasks_of_target(&self, id: i64) -> FleetResult<Vec<Task>> {
        self.get_target(id).await?;
        self.guarded("tasks_of_target", self.repos.tasks.list_by_target(id))
            .await
    }

    pub async fn apply_tag_to_target(&self, target_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded(
            "apply_tag_to_target",
            self.repos.targets.add_tags(target_id, &[tag_id]),
        )
        .await
    }

    pub async fn remove_tag_from_target(&self, target_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded(
            "remove_tag_from_target",
            self.repos.targets.remove_tags(target_id, &[tag_id]),
        )
        .await
    }

    // ---- 标签 ----

    pub async fn create_tag(&self, name: &str) -> FleetResult<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FleetError::validation_error("标签名称不能为空"));
        }
        self.guarded("create_tag", self.repos.tags.create(name)).await
    }

    /// 幂等批量创建，已存在的名称直接复用
    pub async fn create_tags(&self, names: &[String]) -> FleetResult<Vec<Tag>> {
        if names.iter().any(|n| n.trim().is_empty()) {
            return Err(FleetError::validation_error("标签名称不能为空"));
        }
        self.guarded("create_tags", self.repos.tags.get_or_create_many(names))
            .await
    }

    pub async fn get_tag(&self, id: i64) -> FleetResult<Tag> {
        self.guarded("get_tag", self.repos.tags.get_by_id(id))
            .await?
            .ok_or_else(|| FleetError::tag_not_found(id))
    }

    pub async fn list_tags(&self) -> FleetResult<Vec<Tag>> {
        self.guarded("list_tags", self.repos.tags.list()).await
    }

    // ---- 任务 ----

    pub async fn get_task(&self, id: i64) -> FleetResult<Task> {
        self.guarded("get_task", self.repos.tasks.get_by_id(id))
            .await?
            .ok_or_else(|| FleetError::task_not_found(id))
    }

    pub async fn list_tasks(&self) -> FleetResult<Vec<Task>> {
        self.guarded("list_tasks", self.repos.tasks.list()).await
    }

    pub async fn apply_tag_to_task(&self, task_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded(
            "apply_tag_to_task",
            self.repos.tasks.add_tags(task_id, &[tag_id]),
        )
        .await
    }

    pub async fn remove_tag_from_task(&self, task_id: i64, tag_id: i64) -> FleetResult<()> {
        self.guarded(
            "remove_tag_from_task",
            self.repos.tasks.remove_tags(task_id, &[tag_id]),
        )
        .await
    }

    // ---- 凭据 ----

    pub async fn add_credential_for_target(
        &self,
        target_id: i64,
        principal: &str,
        secret: &str,
    ) -> FleetResult<Credential> {
        self.credentials
            .add_credential(target_id, principal, secret)
            .await
    }

    pub async fn report_credential_failure(&self, id: i64) -> FleetResult<i64> {
        self.credentials.report_failure(id).await
    }

    pub async fn get_credential(&self, id: i64) -> FleetResult<Credential> {
        self.guarded("get_credential", self.repos.credentials.get_by_id(id))
            .await?
            .ok_or_else(|| FleetError::credential_not_found(id))
    }

    pub async fn list_credentials(&self) -> FleetResult<Vec<Credential>> {
        self.guarded("list_credentials", self.repos.credentials.list())
            .await
    }

    pub async fn credentials_of_target(&self, target_id: i64) -> FleetResult<Vec<Credential>> {
        self.credentials.list_for_target(target_id).await
    }

    // ---- 身份登记 ----

    #[instrument(skip(self, public_key), fields(service = %service, target_id = ?target_id))]
    pub async fn register_identity(
        &self,
        service: &str,
        public_key: &str,
        target_id: Option<i64>,
    ) -> FleetResult<Identity> {
        if service.trim().is_empty() {
            return Err(FleetError::validation_error("服务名不能为空"));
        }
        decode_public_key(public_key)
            .map_err(|e| FleetError::validation_error(format!("公钥无效: {e}")))?;
        if let Some(target_id) = target_id {
            self.get_target(target_id).await?;
        }

        let identity = self
            .guarded(
                "register_identity",
                self.repos.identities.register(service, public_key, target_id),
            )
            .await?;
        info!("身份已登记到服务 {}", identity.service);
        Ok(identity)
    }

    pub async fn list_identities(&self) -> FleetResult<Vec<Identity>> {
        self.guarded("list_identities", self.repos.identities.list())
            .await
    }

    pub async fn revoke_identity(&self, public_key: &str) -> FleetResult<()> {
        let removed = self
            .guarded("revoke_identity", self.repos.identities.revoke(public_key))
            .await?;
        if !removed {
            return Err(FleetError::not_found("身份", public_key));
        }
        Ok(())
    }
}
