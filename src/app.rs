use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fleet_api::FleetService;
use fleet_auth::Signer;
use fleet_core::AppConfig;
use fleet_infrastructure::{DatabaseManager, FleetRepositories};
use fleet_worker::{key_source, Agent, AssetLoader, DirAssetLoader, HostInfo, ShellExecutor};
use tokio::sync::broadcast;
use tracing::info;

/// 主应用程序：持有数据库连接与控制平面服务
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    service: Arc<FleetService>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let database = DatabaseManager::new(&config.database)
            .await
            .context("创建数据库连接池失败")?;
        database.migrate().await.context("执行数据库迁移失败")?;

        let repos = FleetRepositories::sqlite(database.pool().clone());
        let service = Arc::new(FleetService::from_config(repos, &config));
        info!("控制平面已初始化: {}", config.database.url);

        Ok(Self {
            config,
            database,
            service,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn service(&self) -> &FleetService {
        &self.service
    }

    /// 构建进程内 Agent，直接调用本地控制平面
    pub fn build_agent(&self) -> Result<Agent> {
        let agent_config = &self.config.agent;
        let signer = Signer::from_source(&self.config.auth.service_name, &key_source(agent_config))
            .context("加载Agent密钥失败")?;

        let mut executor = ShellExecutor::new();
        if let Some(dir) = &agent_config.assets_dir {
            let assets: Arc<dyn AssetLoader> = Arc::new(DirAssetLoader::new(dir));
            executor = executor.with_assets(assets);
        }

        Ok(Agent::new(
            signer,
            self.service.clone(),
            Arc::new(executor),
            &HostInfo::collect(agent_config),
            Duration::from_secs(agent_config.poll_interval_seconds),
        ))
    }

    pub async fn run_agent(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let agent = self.build_agent()?;
        info!("Agent 公钥: {}", agent.signer().identity());
        agent.run(shutdown_rx).await;
        Ok(())
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
