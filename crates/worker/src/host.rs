use fleet_core::AgentConfig;
use fleet_domain::value_objects::ClaimTasksRequest;
use tracing::warn;

/// 本机属性，用作认领过滤条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub primary_ip: String,
    pub machine_uuid: Option<String>,
    pub primary_mac: Option<String>,
}

impl HostInfo {
    pub fn collect(config: &AgentConfig) -> Self {
        let hostname = match hostname::get() {
            Ok(name) => name.into_string().ok(),
            Err(e) => {
                warn!("获取主机名失败: {}", e);
                None
            }
        };

        Self {
            hostname,
            primary_ip: config.primary_ip.clone(),
            machine_uuid: config.machine_uuid.clone(),
            primary_mac: config.primary_mac.clone(),
        }
    }

    /// 主机名不参与过滤
    pub fn to_claim_request(&self) -> ClaimTasksRequest {
        ClaimTasksRequest {
            machine_uuid: self.machine_uuid.clone(),
            primary_mac: self.primary_mac.clone(),
            hostname: None,
            primary_ip: Some(self.primary_ip.clone()),
        }
    }
}
