mod tag_links;

pub mod sqlite_credential_repository;
pub mod sqlite_identity_repository;
pub mod sqlite_job_repository;
pub mod sqlite_tag_repository;
pub mod sqlite_target_repository;
pub mod sqlite_task_repository;

pub use sqlite_credential_repository::SqliteCredentialRepository;
pub use sqlite_identity_repository::SqliteIdentityRepository;
pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_tag_repository::SqliteTagRepository;
pub use sqlite_target_repository::SqliteTargetRepository;
pub use sqlite_task_repository::SqliteTaskRepository;
