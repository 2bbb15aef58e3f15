//! `FleetService`：控制平面的完整操作集合
//!
//! 截止时间作用于单次存储调用，超时按可重试的 `Unavailable` 返回。
//! 组合操作(扇出、认领、提交)把截止时间交给各自的服务逐次应用，外层不再包一层。

mod agent;
mod operator;

use std::future::Future;
use std::time::Duration;

use fleet_auth::Verifier;
use fleet_core::AppConfig;
use fleet_dispatcher::{CredentialTracker, JobDispatcher, TagResolver, TaskClaimService};
use fleet_errors::FleetResult;
use fleet_infrastructure::{FleetRepositories, TimeoutHandler};

use crate::auth::RequestAuthenticator;

pub struct FleetService {
    repos: FleetRepositories,
    resolver: TagResolver,
    dispatcher: JobDispatcher,
    claims: TaskClaimService,
    credentials: CredentialTracker,
    authenticator: RequestAuthenticator,
    timeout: TimeoutHandler,
}

impl FleetService {
    pub fn new(repos: FleetRepositories, verifier: Verifier, timeout: TimeoutHandler) -> Self {
        Self {
            resolver: TagResolver::new(repos.targets.clone()),
            dispatcher: JobDispatcher::new(
                TagResolver::new(repos.targets.clone()),
                repos.jobs.clone(),
                repos.tasks.clone(),
                timeout,
            ),
            claims: TaskClaimService::new(repos.tasks.clone(), repos.targets.clone(), timeout),
            credentials: CredentialTracker::new(
                repos.credentials.clone(),
                repos.targets.clone(),
                timeout,
            ),
            authenticator: RequestAuthenticator::new(verifier, repos.identities.clone()),
            timeout,
            repos,
        }
    }

    pub fn from_config(repos: FleetRepositories, config: &AppConfig) -> Self {
        Self::new(
            repos,
            Verifier::new(config.auth.max_skew_seconds),
            TimeoutHandler::new(Duration::from_secs(
                config.database.operation_timeout_seconds,
            )),
        )
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    async fn guarded<T, F>(&self, operation_name: &str, operation: F) -> FleetResult<T>
    where
        F: Future<Output = FleetResult<T>>,
    {
        self.timeout
            .database_operation(operation, operation_name)
            .await
    }
}
