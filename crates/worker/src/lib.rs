pub mod agent;
pub mod assets;
pub mod client;
pub mod executors;
pub mod host;

pub use agent::{key_source, Agent, PollSummary, SubmitRetry};
pub use assets::{AssetLoader, DirAssetLoader};
pub use client::ControlPlane;
pub use executors::{ExecutionOutcome, ShellExecutor, TaskExecutor};
pub use host::HostInfo;
