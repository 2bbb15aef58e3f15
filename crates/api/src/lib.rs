//! 控制平面对外操作面
//!
//! 运维操作不在这一层签名；Agent 操作(认领、提交)必须携带签名请求头，
//! 并且调用方身份必须在登记处绑定到某个目标。传输层由嵌入方决定。

pub mod auth;
pub mod service;

pub use auth::{AuthenticatedAgent, RequestAuthenticator};
pub use service::FleetService;
