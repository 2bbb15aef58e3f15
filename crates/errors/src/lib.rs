use std::fmt;

use thiserror::Error;

#[cfg(test)]
mod tests;

/// 扇出过程中单个目标的失败记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutFailure {
    pub target_id: i64,
    pub reason: String,
}

impl fmt::Display for FanoutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target {}: {}", self.target_id, self.reason)
    }
}

fn join_failures(failed: &[FanoutFailure]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 控制平面错误类型定义
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("认证失败: {0}")]
    Auth(String),
    #[error("{entity}未找到: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("任务已被认领: {task_id}")]
    AlreadyClaimed { task_id: i64 },
    #[error("任务已完成: {task_id}")]
    AlreadyCompleted { task_id: i64 },
    #[error("无效的状态转换: 任务 {task_id} 处于 {state} 状态，不允许 {action}")]
    InvalidTransition {
        task_id: i64,
        state: String,
        action: &'static str,
    },
    #[error("认领过滤条件未匹配任何目标: {0}")]
    TargetNotFound(String),
    #[error("作业 {job_id} 部分扇出失败: 已创建 {created} 个任务, 失败目标 [{}]", join_failures(.failed))]
    PartialFanout {
        job_id: i64,
        created: usize,
        failed: Vec<FanoutFailure>,
    },
    #[error("存储不可用: {0}")]
    Unavailable(String),
    #[error("数据冲突: {0}")]
    Conflict(String),
    #[error("数据验证失败: {0}")]
    Validation(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type FleetResult<T> = Result<T, FleetError>;

impl FleetError {
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::not_found("任务", id)
    }
    pub fn target_not_found(id: i64) -> Self {
        Self::not_found("目标", id)
    }
    pub fn job_not_found(id: i64) -> Self {
        Self::not_found("作业", id)
    }
    pub fn tag_not_found(id: i64) -> Self {
        Self::not_found("标签", id)
    }
    pub fn credential_not_found(id: i64) -> Self {
        Self::not_found("凭据", id)
    }
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 只有存储/传输层故障可以由调用方退避重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, FleetError::Unavailable(_))
    }

    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            FleetError::AlreadyClaimed { .. }
                | FleetError::AlreadyCompleted { .. }
                | FleetError::InvalidTransition { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FleetError::Internal(_) | FleetError::Configuration(_)
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            FleetError::Auth(_) => "请求签名无效或已过期",
            FleetError::NotFound { .. } => "请求的资源不存在",
            FleetError::AlreadyClaimed { .. } => "任务已被其他执行者认领",
            FleetError::AlreadyCompleted { .. } => "任务已经完成",
            FleetError::InvalidTransition { .. } => "任务当前状态不允许该操作",
            FleetError::TargetNotFound(_) => "未找到匹配的目标主机",
            FleetError::PartialFanout { .. } => "部分目标任务创建失败，请针对失败目标重新下发",
            FleetError::Conflict(_) => "资源已存在",
            FleetError::Validation(_) => "输入数据验证失败",
            FleetError::Unavailable(_) => "存储暂时不可用，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<sqlx::Error> for FleetError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                FleetError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                FleetError::Validation(format!("引用的实体不存在: {}", db_err.message()))
            }
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => FleetError::Internal(err.to_string()),
            _ => FleetError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FleetError {
    fn from(err: anyhow::Error) -> Self {
        FleetError::Internal(err.to_string())
    }
}
