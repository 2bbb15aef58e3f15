use serde::{Deserialize, Serialize};

/// Agent 密钥来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeySourceKind {
    /// 配置中直接提供 `b64pub:b64priv`
    Provided,
    /// 从环境变量读取 `b64pub:b64priv`
    Environment,
    /// 临时生成，服务端无法识别为已注册身份
    Ephemeral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub key_source: KeySourceKind,
    pub key_env_var: String,
    #[serde(default)]
    pub key: Option<String>,
    pub poll_interval_seconds: u64,
    pub primary_ip: String,
    #[serde(default)]
    pub machine_uuid: Option<String>,
    #[serde(default)]
    pub primary_mac: Option<String>,
    #[serde(default)]
    pub assets_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            key_source: KeySourceKind::Environment,
            key_env_var: "FLEET_SVC_KEY".to_string(),
            key: None,
            poll_interval_seconds: 5,
            primary_ip: "127.0.0.1".to_string(),
            machine_uuid: None,
            primary_mac: None,
            assets_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }
        if self.primary_ip.is_empty() {
            return Err(anyhow::anyhow!("主IP不能为空"));
        }
        match self.key_source {
            KeySourceKind::Provided if self.key.as_deref().unwrap_or("").is_empty() => {
                Err(anyhow::anyhow!("key_source = provided 时必须配置 key"))
            }
            KeySourceKind::Environment if self.key_env_var.is_empty() => {
                Err(anyhow::anyhow!("key_source = environment 时必须配置 key_env_var"))
            }
            _ => Ok(()),
        }
    }
}
