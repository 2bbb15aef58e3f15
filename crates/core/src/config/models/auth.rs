use serde::{Deserialize, Serialize};

/// 请求签名校验配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 允许的时钟偏差窗口(秒)，超出窗口的签名按重放拒绝
    pub max_skew_seconds: i64,
    /// Agent 声明的服务名
    pub service_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_skew_seconds: 300,
            service_name: "fleet-agent".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_skew_seconds <= 0 {
            return Err(anyhow::anyhow!("签名时间窗口必须大于0"));
        }
        if self.service_name.trim().is_empty() {
            return Err(anyhow::anyhow!("服务名不能为空"));
        }
        Ok(())
    }
}
