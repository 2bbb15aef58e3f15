use fleet_auth::RequestHeaders;
use fleet_domain::{
    entities::Task,
    value_objects::{ClaimTasksRequest, SubmitTaskResultRequest},
};
use fleet_errors::FleetResult;

use super::FleetService;

/// Agent 操作面，所有调用先校验签名并解析调用方绑定的目标
impl FleetService {
    pub async fn claim_tasks(
        &self,
        headers: &RequestHeaders,
        filter: &ClaimTasksRequest,
    ) -> FleetResult<Vec<Task>> {
        let agent = self
            .guarded("authenticate", self.authenticator.authenticate(headers))
            .await?;
        self.claims.claim_tasks(filter, agent.target_id).await
    }

    pub async fn claim_task(&self, headers: &RequestHeaders, id: i64) -> FleetResult<Task> {
        let agent = self
            .guarded("authenticate", self.authenticator.authenticate(headers))
            .await?;
        self.claims.claim_task(id, agent.target_id).await
    }

    pub async fn submit_task_result(
        &self,
        headers: &RequestHeaders,
        result: &SubmitTaskResultRequest,
    ) -> FleetResult<Task> {
        let agent = self
            .guarded("authenticate", self.authenticator.authenticate(headers))
            .await?;
        self.claims.submit_result(result, agent.target_id).await
    }
}
