use chrono::{DateTime, Utc};
use fleet_errors::{FleetError, FleetResult};
use serde::{Deserialize, Serialize};

/// 登记新目标
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTarget {
    pub name: String,
    pub primary_ip: String,
    pub hostname: Option<String>,
    pub machine_uuid: Option<String>,
    pub primary_mac: Option<String>,
    pub public_ip: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl NewTarget {
    pub fn new(name: impl Into<String>, primary_ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_ip: primary_ip.into(),
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    pub fn validate(&self) -> FleetResult<()> {
        if self.name.trim().is_empty() {
            return Err(FleetError::validation_error("目标名称不能为空"));
        }
        if self.primary_ip.trim().is_empty() {
            return Err(FleetError::validation_error("目标主IP不能为空"));
        }
        Ok(())
    }
}

/// 目标字段的部分更新，`None` 表示保持不变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFieldsUpdate {
    pub name: Option<String>,
    pub primary_ip: Option<String>,
    pub hostname: Option<String>,
    pub machine_uuid: Option<String>,
    pub primary_mac: Option<String>,
    pub public_ip: Option<String>,
}

impl TargetFieldsUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.primary_ip.is_none()
            && self.hostname.is_none()
            && self.machine_uuid.is_none()
            && self.primary_mac.is_none()
            && self.public_ip.is_none()
    }

    pub fn validate(&self) -> FleetResult<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(FleetError::validation_error("目标名称不能为空"));
        }
        if matches!(&self.primary_ip, Some(ip) if ip.trim().is_empty()) {
            return Err(FleetError::validation_error("目标主IP不能为空"));
        }
        Ok(())
    }
}

/// 创建作业的输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    pub prev_job_id: Option<i64>,
}

impl CreateJobRequest {
    pub fn new(name: impl Into<String>, content: impl Into<String>, tag_ids: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            tag_ids,
            prev_job_id: None,
        }
    }

    pub fn after(mut self, prev_job_id: i64) -> Self {
        self.prev_job_id = Some(prev_job_id);
        self
    }
}

/// 扇出阶段为单个目标物化的任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub job_id: i64,
    pub target_id: i64,
    pub content: String,
    pub queue_time: DateTime<Utc>,
    pub tag_ids: Vec<i64>,
}

/// 按主机属性定位目标，已提供的字段之间是 AND 关系
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTasksRequest {
    pub machine_uuid: Option<String>,
    pub primary_mac: Option<String>,
    pub hostname: Option<String>,
    pub primary_ip: Option<String>,
}

impl ClaimTasksRequest {
    pub fn is_empty(&self) -> bool {
        self.machine_uuid.is_none()
            && self.primary_mac.is_none()
            && self.hostname.is_none()
            && self.primary_ip.is_none()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(v) = &self.machine_uuid {
            parts.push(format!("machine_uuid={v}"));
        }
        if let Some(v) = &self.primary_mac {
            parts.push(format!("primary_mac={v}"));
        }
        if let Some(v) = &self.hostname {
            parts.push(format!("hostname={v}"));
        }
        if let Some(v) = &self.primary_ip {
            parts.push(format!("primary_ip={v}"));
        }
        parts.join(", ")
    }
}

/// Agent 回传的执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTaskResultRequest {
    pub id: i64,
    pub output: String,
    pub error: Option<String>,
    pub exec_start_time: Option<DateTime<Utc>>,
    pub exec_stop_time: Option<DateTime<Utc>>,
}

impl SubmitTaskResultRequest {
    pub fn new(id: i64, output: impl Into<String>) -> Self {
        Self {
            id,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_execution_window(mut self, start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        self.exec_start_time = Some(start);
        self.exec_stop_time = Some(stop);
        self
    }

    pub fn validate(&self) -> FleetResult<()> {
        if let (Some(start), Some(stop)) = (self.exec_start_time, self.exec_stop_time) {
            if stop < start {
                return Err(FleetError::validation_error("执行结束时间早于开始时间"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claim_request_describe_lists_only_present_fields() {
        let request = ClaimTasksRequest {
            hostname: Some("web-1".to_string()),
            primary_ip: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        assert!(!request.is_empty());
        assert_eq!(request.describe(), "hostname=web-1, primary_ip=10.0.0.1");
        assert!(ClaimTasksRequest::default().is_empty());
    }

    #[test]
    fn test_new_target_validation() {
        assert!(NewTarget::new("web-1", "10.0.0.1").validate().is_ok());
        assert!(NewTarget::new(" ", "10.0.0.1").validate().is_err());
        assert!(NewTarget::new("web-1", "").validate().is_err());
    }

    #[test]
    fn test_fields_update_validation() {
        assert!(TargetFieldsUpdate::default().is_empty());
        let update = TargetFieldsUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_submit_rejects_inverted_execution_window() {
        let now = Utc::now();
        let ok = SubmitTaskResultRequest::new(1, "ok").with_execution_window(now, now);
        assert!(ok.validate().is_ok());

        let bad = SubmitTaskResultRequest::new(1, "ok")
            .with_execution_window(now, now - Duration::seconds(1));
        assert!(matches!(bad.validate(), Err(FleetError::Validation(_))));
    }
}
