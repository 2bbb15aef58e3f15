use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;

pub struct TestEnv;

impl TestEnv {
    /// 轮询条件直到成立或超时
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
