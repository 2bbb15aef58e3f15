use std::sync::Arc;

use fleet_domain::{
    entities::Credential,
    repositories::{CredentialRepository, TargetRepository},
};
use fleet_errors::{FleetError, FleetResult};
use fleet_infrastructure::TimeoutHandler;
use metrics::counter;
use tracing::{info, instrument};

/// 凭据登记与失败计数；不实施任何锁定策略
///
/// 失败计数的自增不受截止时间取消，超时重试不会重复计数。
pub struct CredentialTracker {
    credential_repo: Arc<dyn CredentialRepository>,
    target_repo: Arc<dyn TargetRepository>,
    deadline: TimeoutHandler,
}

impl CredentialTracker {
    pub fn new(
        credential_repo: Arc<dyn CredentialRepository>,
        target_repo: Arc<dyn TargetRepository>,
        deadline: TimeoutHandler,
    ) -> Self {
        Self {
            credential_repo,
            target_repo,
            deadline,
        }
    }

    #[instrument(skip(self, principal, secret), fields(target_id = %target_id))]
    pub async fn add_credential(
        &self,
        target_id: i64,
        principal: &str,
        secret: &str,
    ) -> FleetResult<Credential> {
        if principal.trim().is_empty() {
            return Err(FleetError::validation_error("凭据主体不能为空"));
        }
        self.ensure_target(target_id).await?;

        let credential = self
            .deadline
            .database_operation(
                self.credential_repo.create(target_id, principal, secret),
                "create_credential",
            )
            .await?;
        info!("目标 {} 新增凭据 {}", target_id, credential.id);
        Ok(credential)
    }

    /// 失败计数加一并返回新值
    #[instrument(skip(self), fields(credential_id = %id))]
    pub async fn report_failure(&self, id: i64) -> FleetResult<i64> {
        let fails = self
            .credential_repo
            .increment_fails(id)
            .await?
            .ok_or_else(|| FleetError::credential_not_found(id))?;

        counter!("fleet_credential_failures_total").increment(1);
        info!("凭据 {} 失败次数: {}", id, fails);
        Ok(fails)
    }

    pub async fn list_for_target(&self, target_id: i64) -> FleetResult<Vec<Credential>> {
        self.ensure_target(target_id).await?;
        self.deadline
            .database_operation(
                self.credential_repo.list_by_target(target_id),
                "list_credentials_of_target",
            )
            .await
    }

    async fn ensure_target(&self, target_id: i64) -> FleetResult<()> {
        let target = self
            .deadline
            .database_operation(self.target_repo.get_by_id(target_id), "get_target")
            .await?;
        match target {
            Some(_) => Ok(()),
            None => Err(FleetError::target_not_found(target_id)),
        }
    }
}
