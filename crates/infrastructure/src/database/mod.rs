pub mod manager;
pub mod mapping;
pub mod migrations;
pub mod repositories;
pub mod sqlite;

pub use manager::{DatabaseManager, DbPool};
pub use migrations::run_migrations;
pub use repositories::FleetRepositories;
pub use sqlite::{
    SqliteCredentialRepository, SqliteIdentityRepository, SqliteJobRepository,
    SqliteTagRepository, SqliteTargetRepository, SqliteTaskRepository,
};
