//! 控制平面核心服务
//!
//! 标签解析、作业扇出、任务认领与凭据失败计数。所有状态变更都通过仓储的
//! 单条原子操作完成，服务本身不持有跨调用的缓存或锁。

pub mod claim_service;
pub mod credential_tracker;
pub mod job_dispatcher;
pub mod tag_resolver;

pub use claim_service::TaskClaimService;
pub use credential_tracker::CredentialTracker;
pub use job_dispatcher::{DispatchedJob, JobDispatcher};
pub use tag_resolver::TagResolver;
