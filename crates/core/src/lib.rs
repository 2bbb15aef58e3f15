pub mod config;
pub mod logging;

pub use config::models::{
    AgentConfig, AppConfig, AuthConfig, DatabaseConfig, KeySourceKind, ObservabilityConfig,
};
pub use fleet_errors::*;
pub use logging::{init_logging, LogFormat};
