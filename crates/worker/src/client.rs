use async_trait::async_trait;
use fleet_api::FleetService;
use fleet_auth::RequestHeaders;
use fleet_domain::{
    entities::Task,
    value_objects::{ClaimTasksRequest, SubmitTaskResultRequest},
};
use fleet_errors::FleetResult;

/// Agent 依赖的控制平面接口，传输方式由实现决定
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn claim_tasks(
        &self,
        headers: &RequestHeaders,
        filter: &ClaimTasksRequest,
    ) -> FleetResult<Vec<Task>>;

    async fn submit_task_result(
        &self,
        headers: &RequestHeaders,
        result: &SubmitTaskResultRequest,
    ) -> FleetResult<Task>;
}

/// 进程内直连控制平面
#[async_trait]
impl ControlPlane for FleetService {
    async fn claim_tasks(
        &self,
        headers: &RequestHeaders,
        filter: &ClaimTasksRequest,
    ) -> FleetResult<Vec<Task>> {
        FleetService::claim_tasks(self, headers, filter).await
    }

    async fn submit_task_result(
        &self,
        headers: &RequestHeaders,
        result: &SubmitTaskResultRequest,
    ) -> FleetResult<Task> {
        FleetService::submit_task_result(self, headers, result).await
    }
}
