use crate::*;

#[test]
fn test_fleet_error_display() {
    let auth_error = FleetError::auth("签名校验失败");
    assert_eq!(auth_error.to_string(), "认证失败: 签名校验失败");

    let not_found = FleetError::task_not_found(42);
    assert_eq!(not_found.to_string(), "任务未找到: 42");

    let claimed = FleetError::AlreadyClaimed { task_id: 7 };
    assert_eq!(claimed.to_string(), "任务已被认领: 7");

    let completed = FleetError::AlreadyCompleted { task_id: 7 };
    assert_eq!(completed.to_string(), "任务已完成: 7");

    let transition = FleetError::InvalidTransition {
        task_id: 9,
        state: "QUEUED".to_string(),
        action: "submit_result",
    };
    assert_eq!(
        transition.to_string(),
        "无效的状态转换: 任务 9 处于 QUEUED 状态，不允许 submit_result"
    );

    let unavailable = FleetError::unavailable("pool timed out");
    assert_eq!(unavailable.to_string(), "存储不可用: pool timed out");
}

#[test]
fn test_partial_fanout_names_failed_targets() {
    let err = FleetError::PartialFanout {
        job_id: 3,
        created: 2,
        failed: vec![
            FanoutFailure {
                target_id: 11,
                reason: "disk full".to_string(),
            },
            FanoutFailure {
                target_id: 12,
                reason: "locked".to_string(),
            },
        ],
    };
    let message = err.to_string();
    assert!(message.contains("作业 3"));
    assert!(message.contains("target 11: disk full"));
    assert!(message.contains("target 12: locked"));
}

#[test]
fn test_error_classification() {
    assert!(FleetError::unavailable("x").is_retryable());
    assert!(!FleetError::auth("x").is_retryable());
    assert!(!FleetError::AlreadyClaimed { task_id: 1 }.is_retryable());
    assert!(!FleetError::conflict("dup").is_retryable());

    assert!(FleetError::AlreadyClaimed { task_id: 1 }.is_state_violation());
    assert!(FleetError::AlreadyCompleted { task_id: 1 }.is_state_violation());
    assert!(!FleetError::task_not_found(1).is_state_violation());

    assert!(FleetError::Internal("boom".to_string()).is_fatal());
    assert!(FleetError::config_error("bad").is_fatal());
    assert!(!FleetError::validation_error("bad").is_fatal());
}

#[test]
fn test_user_messages() {
    assert_eq!(
        FleetError::AlreadyClaimed { task_id: 1 }.user_message(),
        "任务已被其他执行者认领"
    );
    assert_eq!(
        FleetError::unavailable("x").user_message(),
        "存储暂时不可用，请稍后重试"
    );
    assert_eq!(
        FleetError::Serialization("x".to_string()).user_message(),
        "系统繁忙，请稍后重试"
    );
}

#[test]
fn test_error_conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let err: FleetError = json_err.into();
    assert!(matches!(err, FleetError::Serialization(_)));

    let err: FleetError = anyhow::anyhow!("wrapped").into();
    assert!(matches!(err, FleetError::Internal(ref m) if m == "wrapped"));

    let err: FleetError = sqlx::Error::PoolTimedOut.into();
    assert!(err.is_retryable());

    let err: FleetError = sqlx::Error::ColumnNotFound("x".to_string()).into();
    assert!(matches!(err, FleetError::Internal(_)));
}
