//! 测试数据库
//!
//! 每个实例在独立的临时目录中创建 SQLite 文件并执行迁移，
//! 临时目录随实例释放而删除，测试之间互不干扰。

use anyhow::{Context, Result};
use fleet_core::DatabaseConfig;
use fleet_domain::value_objects::NewTarget;
use fleet_domain::{Tag, Target};
use fleet_infrastructure::{DatabaseManager, DbPool, FleetRepositories};
use tempfile::TempDir;

pub struct TestDatabase {
    _dir: TempDir,
    manager: DatabaseManager,
}

impl TestDatabase {
    /// 创建数据库并完成迁移
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("创建临时目录失败")?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("fleet_test.db").display()),
            max_connections: 8,
            min_connections: 1,
            ..Default::default()
        };

        let manager = DatabaseManager::new(&config)
            .await
            .context("连接测试数据库失败")?;
        manager.migrate().await.context("执行迁移失败")?;

        Ok(Self { _dir: dir, manager })
    }

    pub fn pool(&self) -> DbPool {
        self.manager.pool().clone()
    }

    pub fn manager(&self) -> &DatabaseManager {
        &self.manager
    }

    pub fn repositories(&self) -> FleetRepositories {
        FleetRepositories::sqlite(self.pool())
    }

    /// 按名称批量创建标签，返回顺序与输入一致
    pub async fn seed_tags(&self, names: &[&str]) -> Result<Vec<Tag>> {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        Ok(self.repositories().tags.get_or_create_many(&names).await?)
    }

    pub async fn seed_target(&self, name: &str, primary_ip: &str, tag_ids: &[i64]) -> Result<Target> {
        let target = NewTarget::new(name, primary_ip).with_tags(tag_ids.to_vec());
        Ok(self.repositories().targets.create(&target).await?)
    }
}
