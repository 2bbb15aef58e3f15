//! 运维命令行

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fleet_auth::Signer;
use fleet_domain::value_objects::{CreateJobRequest, NewTarget, TargetFieldsUpdate};
use serde_json::{json, Value};

use crate::app::Application;

#[derive(Debug, Parser)]
#[command(name = "fleet", version, about = "分布式任务下发控制平面")]
pub struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_parser = ["json", "pretty"])]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 执行数据库迁移
    Migrate,
    /// 生成 Agent 密钥对 (b64pub:b64priv)
    Keygen,
    #[command(subcommand)]
    Tag(TagCommand),
    #[command(subcommand)]
    Target(TargetCommand),
    #[command(subcommand)]
    Job(JobCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Credential(CredentialCommand),
    #[command(subcommand)]
    Identity(IdentityCommand),
    /// 在本进程内运行 Agent 轮询循环
    Agent,
}

#[derive(Debug, Subcommand)]
pub enum TagCommand {
    /// 创建标签，已存在的名称直接复用
    Create { names: Vec<String> },
    List,
}

#[derive(Debug, Args)]
pub struct HostFields {
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub machine_uuid: Option<String>,
    #[arg(long)]
    pub mac: Option<String>,
    #[arg(long)]
    pub public_ip: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum TargetCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        ip: String,
        #[command(flatten)]
        host: HostFields,
        #[arg(long = "tag")]
        tags: Vec<i64>,
    },
    List,
    Show { id: i64 },
    Set {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[command(flatten)]
        host: HostFields,
    },
    Delete { id: i64 },
    Tag { id: i64, tag_id: i64 },
    Untag { id: i64, tag_id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<i64>,
        /// 前驱作业
        #[arg(long)]
        after: Option<i64>,
    },
    List,
    /// 显示作业及其前驱、后继和任务
    Show { id: i64 },
    Tag { id: i64, tag_id: i64 },
    Untag { id: i64, tag_id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    List {
        #[arg(long, conflicts_with = "target")]
        job: Option<i64>,
        #[arg(long)]
        target: Option<i64>,
    },
    Show { id: i64 },
    Tag { id: i64, tag_id: i64 },
    Untag { id: i64, tag_id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum CredentialCommand {
    Add {
        target_id: i64,
        principal: String,
        secret: String,
    },
    /// 失败计数加一
    Fail { id: i64 },
    List {
        #[arg(long)]
        target: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum IdentityCommand {
    Register {
        public_key: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        target: Option<i64>,
    },
    List,
    Revoke { public_key: String },
}

/// 执行不需要长期运行的命令，返回要打印的 JSON
pub async fn execute(app: &Application, command: Command) -> Result<Value> {
    let service = app.service();

    let value = match command {
        Command::Migrate => json!({ "migrated": true }),
        Command::Keygen => {
            let signer = Signer::generate(&app.config().auth.service_name);
            json!({
                "service": signer.service(),
                "public_key": signer.identity(),
                "key_pair": signer.export_key_pair(),
            })
        }
        Command::Tag(TagCommand::Create { names }) => {
            json!(service.create_tags(&names).await?)
        }
        Command::Tag(TagCommand::List) => json!(service.list_tags().await?),

        Command::Target(cmd) => match cmd {
            TargetCommand::Add {
                name,
                ip,
                host,
                tags,
            } => {
                let target = NewTarget {
                    hostname: host.hostname,
                    machine_uuid: host.machine_uuid,
                    primary_mac: host.mac,
                    public_ip: host.public_ip,
                    ..NewTarget::new(name, ip).with_tags(tags)
                };
                json!(service.create_target(&target).await?)
            }
            TargetCommand::List => json!(service.list_targets().await?),
            TargetCommand::Show { id } => json!({
                "target": service.get_target(id).await?,
                "tasks": service.tasks_of_target(id).await?,
            }),
            TargetCommand::Set { id, name, ip, host } => {
                let update = TargetFieldsUpdate {
                    name,
                    primary_ip: ip,
                    hostname: host.hostname,
                    machine_uuid: host.machine_uuid,
                    primary_mac: host.mac,
                    public_ip: host.public_ip,
                };
                json!(service.set_target_fields(id, &update).await?)
            }
            TargetCommand::Delete { id } => {
                service.delete_target(id).await?;
                json!({ "deleted": id })
            }
            TargetCommand::Tag { id, tag_id } => {
                service.apply_tag_to_target(id, tag_id).await?;
                json!(service.get_target(id).await?)
            }
            TargetCommand::Untag { id, tag_id } => {
                service.remove_tag_from_target(id, tag_id).await?;
                json!(service.get_target(id).await?)
            }
        },

        Command::Job(cmd) => match cmd {
            JobCommand::Create {
                name,
                content,
                tags,
                after,
            } => {
                let mut request = CreateJobRequest::new(name, content, tags);
                request.prev_job_id = after;
                let dispatched = service.create_job(&request).await?;
                json!({ "job": dispatched.job, "tasks": dispatched.tasks })
            }
            JobCommand::List => json!(service.list_jobs().await?),
            JobCommand::Show { id } => json!({
                "job": service.get_job(id).await?,
                "prev": service.job_prev(id).await?,
                "next": service.job_next(id).await?,
                "tasks": service.tasks_of_job(id).await?,
            }),
            JobCommand::Tag { id, tag_id } => {
                service.apply_tag_to_job(id, tag_id).await?;
                json!(service.get_job(id).await?)
            }
            JobCommand::Untag { id, tag_id } => {
                service.remove_tag_from_job(id, tag_id).await?;
                json!(service.get_job(id).await?)
            }
        },

        Command::Task(cmd) => match cmd {
            TaskCommand::List { job, target } => match (job, target) {
                (Some(job), _) => json!(service.tasks_of_job(job).await?),
                (None, Some(target)) => json!(service.tasks_of_target(target).await?),
                (None, None) => json!(service.list_tasks().await?),
            },
            TaskCommand::Show { id } => json!(service.get_task(id).await?),
            TaskCommand::Tag { id, tag_id } => {
                service.apply_tag_to_task(id, tag_id).await?;
                json!(service.get_task(id).await?)
            }
            TaskCommand::Untag { id, tag_id } => {
                service.remove_tag_from_task(id, tag_id).await?;
                json!(service.get_task(id).await?)
            }
        },

        Command::Credential(cmd) => match cmd {
            CredentialCommand::Add {
                target_id,
                principal,
                secret,
            } => json!(
                service
                    .add_credential_for_target(target_id, &principal, &secret)
                    .await?
            ),
            CredentialCommand::Fail { id } => {
                json!({ "id": id, "fails": service.report_credential_failure(id).await? })
            }
            CredentialCommand::List { target } => match target {
                Some(target) => json!(service.credentials_of_target(target).await?),
                None => json!(service.list_credentials().await?),
            },
        },

        Command::Identity(cmd) => match cmd {
            IdentityCommand::Register {
                public_key,
                service: service_name,
                target,
            } => {
                let service_name =
                    service_name.unwrap_or_else(|| app.config().auth.service_name.clone());
                json!(
                    service
                        .register_identity(&service_name, &public_key, target)
                        .await?
                )
            }
            IdentityCommand::List => json!(service.list_identities().await?),
            IdentityCommand::Revoke { public_key } => {
                service.revoke_identity(&public_key).await?;
                json!({ "revoked": public_key })
            }
        },

        Command::Agent => {
            return Err(anyhow::anyhow!("agent 命令需要由主循环运行"));
        }
    };

    Ok(value)
}

pub fn render(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("序列化输出失败")
}
