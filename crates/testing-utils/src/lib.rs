//! # Fleet Testing Utils
//!
//! 工作区共享的测试工具：基于临时文件的 SQLite 数据库、可注入故障的仓储包装、
//! 以及实体构建器。
//!
//! ```toml
//! [dev-dependencies]
//! fleet-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod database;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use database::*;
pub use helpers::*;
pub use mocks::*;
