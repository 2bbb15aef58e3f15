//! 目标、作业、任务三类实体共用的标签关联表操作
//!
//! 关联是集合语义：重复关联被 `INSERT OR IGNORE` 吞掉，移除不存在的关联
//! 不影响任何行。未知标签ID会触发外键约束，映射为 `Validation`。

use fleet_errors::FleetResult;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::database::mapping::MappingHelpers;
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::repo_context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagLink {
    Target,
    Job,
    Task,
}

impl TagLink {
    fn link_table(&self) -> &'static str {
        match self {
            TagLink::Target => "target_tags",
            TagLink::Job => "job_tags",
            TagLink::Task => "task_tags",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            TagLink::Target => "target_id",
            TagLink::Job => "job_id",
            TagLink::Task => "task_id",
        }
    }

    fn owner_table(&self) -> &'static str {
        match self {
            TagLink::Target => "targets",
            TagLink::Job => "jobs",
            TagLink::Task => "tasks",
        }
    }

    pub(crate) fn entity(&self) -> &'static str {
        match self {
            TagLink::Target => "目标",
            TagLink::Job => "作业",
            TagLink::Task => "任务",
        }
    }
}

/// 在给定连接（通常是事务）上写入关联
pub(crate) async fn insert_links(
    conn: &mut SqliteConnection,
    link: TagLink,
    owner_id: i64,
    tag_ids: &[i64],
) -> Result<(), sqlx::Error> {
    let tag_ids = MappingHelpers::dedup_ids(tag_ids);
    if tag_ids.is_empty() {
        return Ok(());
    }

    let values = vec!["(?, ?)"; tag_ids.len()].join(", ");
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES {}",
        link.link_table(),
        link.owner_column(),
        values
    );

    let mut query = sqlx::query::<Sqlite>(&sql);
    for tag_id in &tag_ids {
        query = query.bind(owner_id).bind(*tag_id);
    }
    query.execute(conn).await?;
    Ok(())
}

async fn owner_exists(pool: &SqlitePool, link: TagLink, owner_id: i64) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)",
        link.owner_table()
    );
    sqlx::query_scalar::<_, bool>(&sql)
        .bind(owner_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn apply_tags(
    pool: &SqlitePool,
    link: TagLink,
    owner_id: i64,
    tag_ids: &[i64],
) -> FleetResult<()> {
    let context = repo_context!(RepositoryOperation::Link, link.entity(), id = owner_id);

    let exists = owner_exists(pool, link, owner_id)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
    if !exists {
        return Err(RepositoryErrorHelpers::not_found(&context));
    }

    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
    insert_links(&mut *conn, link, owner_id, tag_ids)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

    debug!("{} {} 关联标签 {:?}", link.entity(), owner_id, tag_ids);
    Ok(())
}

pub(crate) async fn remove_tags(
    pool: &SqlitePool,
    link: TagLink,
    owner_id: i64,
    tag_ids: &[i64],
) -> FleetResult<()> {
    let context = repo_context!(RepositoryOperation::Unlink, link.entity(), id = owner_id);

    let exists = owner_exists(pool, link, owner_id)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
    if !exists {
        return Err(RepositoryErrorHelpers::not_found(&context));
    }

    let tag_ids = MappingHelpers::dedup_ids(tag_ids);
    if tag_ids.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "DELETE FROM {} WHERE {} = ? AND tag_id IN ({})",
        link.link_table(),
        link.owner_column(),
        MappingHelpers::placeholders(tag_ids.len())
    );
    let mut query = sqlx::query(&sql).bind(owner_id);
    for tag_id in &tag_ids {
        query = query.bind(*tag_id);
    }
    let result = query
        .execute(pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

    debug!(
        "{} {} 移除标签 {:?}, 实际删除 {} 条关联",
        link.entity(),
        owner_id,
        tag_ids,
        result.rows_affected()
    );
    Ok(())
}
