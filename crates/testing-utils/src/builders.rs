//! 测试实体构建器

use chrono::{DateTime, Utc};
use fleet_domain::entities::{Task, TaskState};
use fleet_domain::value_objects::NewTarget;

/// 构建未落库的 `Task`，用于不依赖数据库的执行端测试
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        Self {
            task: Task {
                id: 1,
                job_id: 1,
                target_id: 1,
                content: "echo hello".to_string(),
                state: TaskState::Claimed,
                queue_time: Utc::now(),
                claim_time: Some(Utc::now()),
                exec_start_time: None,
                exec_stop_time: None,
                completed_time: None,
                output: None,
                error: None,
                tag_ids: vec![],
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_target(mut self, target_id: i64) -> Self {
        self.task.target_id = target_id;
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.task.content = content.to_string();
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.task.state = state;
        self
    }

    pub fn queued_at(mut self, queue_time: DateTime<Utc>) -> Self {
        self.task.queue_time = queue_time;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TargetBuilder {
    target: NewTarget,
}

impl TargetBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            target: NewTarget::new(name, "10.0.0.1"),
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.target.primary_ip = ip.to_string();
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.target.hostname = Some(hostname.to_string());
        self
    }

    pub fn with_machine_uuid(mut self, uuid: &str) -> Self {
        self.target.machine_uuid = Some(uuid.to_string());
        self
    }

    pub fn with_mac(mut self, mac: &str) -> Self {
        self.target.primary_mac = Some(mac.to_string());
        self
    }

    pub fn with_tags(mut self, tag_ids: &[i64]) -> Self {
        self.target.tag_ids = tag_ids.to_vec();
        self
    }

    pub fn build(self) -> NewTarget {
        self.target
    }
}
