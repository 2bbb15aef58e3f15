//! 控制平面配置
//!
//! 加载顺序: 默认值 -> TOML 配置文件 -> 环境变量覆盖 (前缀 `FLEET_`, 层级分隔符 `__`)。

pub mod models;

#[cfg(test)]
mod tests;

pub use models::*;
