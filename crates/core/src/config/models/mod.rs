pub mod agent;
pub mod app_config;
pub mod auth;
pub mod database;
pub mod observability;

pub use agent::{AgentConfig, KeySourceKind};
pub use app_config::AppConfig;
pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
