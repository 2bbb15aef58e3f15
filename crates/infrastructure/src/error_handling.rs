//! 仓储操作的错误上下文
//!
//! 所有 SQLite 仓储共用同一套上下文结构：操作类型、实体类别与标识，
//! 在把 `sqlx::Error` 映射到 `FleetError` 时补上可定位的描述并统一记录日志。

use std::fmt;

use chrono::{DateTime, Utc};
use fleet_errors::FleetError;
use sqlx::Error as SqlxError;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
    Claim,
    Complete,
    Link,
    Unlink,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "检索"),
            RepositoryOperation::Claim => write!(f, "认领"),
            RepositoryOperation::Complete => write!(f, "完成"),
            RepositoryOperation::Link => write!(f, "关联标签到"),
            RepositoryOperation::Unlink => write!(f, "移除标签自"),
        }
    }
}

/// 单次仓储操作的上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    /// 实体类别，例如 "任务"、"目标"
    pub entity: &'static str,
    pub entity_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            entity_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match &self.entity_id {
            Some(id) => format!("{} (ID: {})", self.entity, id),
            None => self.entity.to_string(),
        }
    }

    fn describe(&self) -> String {
        format!("{}{}", self.operation, self.entity_description())
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// 映射数据库错误，保留分类（冲突/引用无效/不可用），补充上下文描述
    pub fn database_error(context: &OperationContext, err: SqlxError) -> FleetError {
        let desc = context.describe();
        match FleetError::from(err) {
            FleetError::Conflict(msg) => {
                warn!(operation = %context.operation, entity = context.entity, "{}时发生唯一约束冲突: {}", desc, msg);
                FleetError::Conflict(format!("{desc}时发生唯一约束冲突: {msg}"))
            }
            FleetError::Validation(msg) => {
                warn!(operation = %context.operation, entity = context.entity, "{}时{}", desc, msg);
                FleetError::Validation(format!("{desc}时{msg}"))
            }
            FleetError::Internal(msg) => {
                error!(operation = %context.operation, entity = context.entity, "{}时数据映射失败: {}", desc, msg);
                FleetError::Internal(format!("{desc}时数据映射失败: {msg}"))
            }
            FleetError::Unavailable(msg) => {
                error!(operation = %context.operation, entity = context.entity, "{}时数据库不可用: {}", desc, msg);
                FleetError::Unavailable(format!("{desc}时数据库不可用: {msg}"))
            }
            other => other,
        }
    }

    pub fn not_found(context: &OperationContext) -> FleetError {
        let id = context.entity_id.clone().unwrap_or_default();
        warn!("{}时未找到: {} 不存在", context.describe(), context.entity_description());
        FleetError::NotFound {
            entity: context.entity,
            id,
        }
    }

    pub fn log_operation_success(context: &OperationContext, additional_info: Option<&str>) {
        let base_msg = format!("{}成功", context.describe());
        match additional_info.or(context.additional_info.as_deref()) {
            Some(info) => info!("{}: {}", base_msg, info),
            None => info!("{}", base_msg),
        }
    }
}

/// 简化上下文构造
#[macro_export]
macro_rules! repo_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_id($id)
    };
}
