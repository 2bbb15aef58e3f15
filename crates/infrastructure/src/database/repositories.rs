use std::sync::Arc;

use fleet_domain::repositories::{
    CredentialRepository, IdentityRepository, JobRepository, TagRepository, TargetRepository,
    TaskRepository,
};

use super::manager::DbPool;
use super::sqlite::{
    SqliteCredentialRepository, SqliteIdentityRepository, SqliteJobRepository,
    SqliteTagRepository, SqliteTargetRepository, SqliteTaskRepository,
};

/// 实体存储的仓储集合，服务层只依赖 trait 对象
#[derive(Clone)]
pub struct FleetRepositories {
    pub targets: Arc<dyn TargetRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub identities: Arc<dyn IdentityRepository>,
}

impl FleetRepositories {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            targets: Arc::new(SqliteTargetRepository::new(pool.clone())),
            tags: Arc::new(SqliteTagRepository::new(pool.clone())),
            jobs: Arc::new(SqliteJobRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            credentials: Arc::new(SqliteCredentialRepository::new(pool.clone())),
            identities: Arc::new(SqliteIdentityRepository::new(pool)),
        }
    }

    pub fn with_tasks(mut self, tasks: Arc<dyn TaskRepository>) -> Self {
        self.tasks = tasks;
        self
    }
}
