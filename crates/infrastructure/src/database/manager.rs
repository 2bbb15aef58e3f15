use std::str::FromStr;
use std::time::Duration;

use fleet_core::DatabaseConfig;
use fleet_errors::{FleetError, FleetResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::migrations::run_migrations;

pub type DbPool = Pool<Sqlite>;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> FleetResult<Self> {
        debug!("Connecting to SQLite database at: {}", config.url);

        // 启用外键约束和WAL模式；busy_timeout 让并发写入排队等待写锁
        let connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| FleetError::config_error(format!("数据库URL无效: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.connection_timeout_seconds));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
            .connect_with(connect_options)
            .await?;

        info!("数据库连接池已建立: {}", config.url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> FleetResult<()> {
        run_migrations(&self.pool).await
    }

    pub async fn health_check(&self) -> FleetResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
