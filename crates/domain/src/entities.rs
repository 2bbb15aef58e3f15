use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 远程主机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub primary_ip: String,
    pub hostname: Option<String>,
    pub machine_uuid: Option<String>,
    pub primary_mac: Option<String>,
    pub public_ip: Option<String>,
    /// 升序、无重复
    pub tag_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl Target {
    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tag_ids.binary_search(&tag_id).is_ok()
    }

    pub fn entity_description(&self) -> String {
        format!(
            "目标 '{}' (ID: {}, IP: {})",
            self.name, self.id, self.primary_ip
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    pub content: String,
    /// 扇出时间 t0，与该作业所有任务的入队时间一致
    pub created_at: DateTime<Utc>,
    pub prev_id: Option<i64>,
    pub tag_ids: Vec<i64>,
}

impl Job {
    pub fn entity_description(&self) -> String {
        format!("作业 '{}' (ID: {})", self.name, self.id)
    }
}

/// 任务生命周期：`Queued -> Claimed -> Completed`，只能前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    #[serde(rename = "QUEUED")]
    Queued,
    #[serde(rename = "CLAIMED")]
    Claimed,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "QUEUED",
            TaskState::Claimed => "CLAIMED",
            TaskState::Completed => "COMPLETED",
        }
    }

    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Queued, TaskState::Claimed) | (TaskState::Claimed, TaskState::Completed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(TaskState::Queued),
            "CLAIMED" => Ok(TaskState::Claimed),
            "COMPLETED" => Ok(TaskState::Completed),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskState {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskState {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(s.parse::<TaskState>()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskState {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 一次作业内容向一个目标的投递
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub job_id: i64,
    pub target_id: i64,
    /// 创建时从作业复制，之后不再变化
    pub content: String,
    pub state: TaskState,
    pub queue_time: DateTime<Utc>,
    pub claim_time: Option<DateTime<Utc>>,
    pub exec_start_time: Option<DateTime<Utc>>,
    pub exec_stop_time: Option<DateTime<Utc>>,
    pub completed_time: Option<DateTime<Utc>>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub tag_ids: Vec<i64>,
}

impl Task {
    pub fn is_queued(&self) -> bool {
        self.state == TaskState::Queued
    }

    pub fn is_claimed(&self) -> bool {
        self.state == TaskState::Claimed
    }

    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    pub fn execution_duration_ms(&self) -> Option<i64> {
        match (self.exec_start_time, self.exec_stop_time) {
            (Some(start), Some(stop)) => Some((stop - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务 (ID: {}, 作业: {}, 目标: {}, 状态: {})",
            self.id, self.job_id, self.target_id, self.state
        )
    }
}

/// 从目标上收集的凭据
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub target_id: i64,
    pub principal: String,
    pub secret: String,
    /// 只增不减
    pub fails: i64,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("target_id", &self.target_id)
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .field("fails", &self.fails)
            .finish()
    }
}

/// 已登记的 Agent 公钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// base64 编码的 Ed25519 公钥
    pub public_key: String,
    pub service: String,
    /// 未绑定目标的身份可以通过认证，但不能认领任务
    pub target_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_transitions_only_move_forward() {
        use TaskState::*;
        assert!(Queued.can_transition_to(Claimed));
        assert!(Claimed.can_transition_to(Completed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Claimed.can_transition_to(Queued));
        assert!(!Completed.can_transition_to(Claimed));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_task_state_string_forms() {
        for state in [TaskState::Queued, TaskState::Claimed, TaskState::Completed] {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
        assert!("RUNNING".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let credential = Credential {
            id: 1,
            target_id: 2,
            principal: "root".to_string(),
            secret: "hunter2".to_string(),
            fails: 0,
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("root"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_target_has_tag() {
        let target = Target {
            id: 1,
            name: "web-1".to_string(),
            primary_ip: "10.0.0.1".to_string(),
            hostname: None,
            machine_uuid: None,
            primary_mac: None,
            public_ip: None,
            tag_ids: vec![1, 4, 9],
            created_at: Utc::now(),
        };
        assert!(target.has_tag(4));
        assert!(!target.has_tag(5));
    }
}
