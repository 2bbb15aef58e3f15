//! 存储调用的截止时间
//!
//! 调用方把截止时间传递到每一次存储调用；超时映射为可重试的 `Unavailable`，
//! 不改变任何任务状态。被丢弃的 future 只会在语句边界上取消，
//! 单条条件更新要么整体生效要么不生效。

use std::future::Future;
use std::time::Duration;

use fleet_errors::{FleetError, FleetResult};
use tokio::time::timeout;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutHandler {
    operation_timeout: Duration,
}

impl TimeoutHandler {
    pub fn new(operation_timeout: Duration) -> Self {
        Self { operation_timeout }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub async fn database_operation<F, T>(&self, operation: F, operation_name: &str) -> FleetResult<T>
    where
        F: Future<Output = FleetResult<T>>,
    {
        match timeout(self.operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                let error_msg = format!(
                    "数据库操作 '{operation_name}' 超时 (超时时间: {:?})",
                    self.operation_timeout
                );
                error!("{}", error_msg);
                Err(FleetError::unavailable(error_msg))
            }
        }
    }
}
