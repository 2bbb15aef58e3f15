use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_domain::{
    entities::{Task, TaskState},
    repositories::TaskRepository,
    value_objects::{NewTask, SubmitTaskResultRequest},
};
use fleet_errors::{FleetError, FleetResult};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use super::tag_links::{self, TagLink};
use crate::{
    database::mapping::MappingHelpers,
    error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "任务";

const TASK_SELECT: &str = "SELECT k.id, k.job_id, k.target_id, k.content, k.state, k.queue_time, k.claim_time, \
k.exec_start_time, k.exec_stop_time, k.completed_time, k.output, k.error, \
(SELECT group_concat(kt.tag_id) FROM task_tags kt WHERE kt.task_id = k.id) AS tag_ids \
FROM tasks k";

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &SqliteRow) -> FleetResult<Task> {
        Ok(Task {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            target_id: row.try_get("target_id")?,
            content: row.try_get("content")?,
            state: row.try_get("state")?,
            queue_time: row.try_get("queue_time")?,
            claim_time: row.try_get("claim_time")?,
            exec_start_time: row.try_get("exec_start_time")?,
            exec_stop_time: row.try_get("exec_stop_time")?,
            completed_time: row.try_get("completed_time")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            tag_ids: MappingHelpers::parse_id_list(row, "tag_ids")?,
        })
    }

    async fn fetch_by_ids(
        conn: &mut SqliteConnection,
        context: &OperationContext,
        ids: &[i64],
    ) -> FleetResult<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{TASK_SELECT} WHERE k.id IN ({}) ORDER BY k.id",
            MappingHelpers::placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query
            .fetch_all(conn)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn fetch_where(
        &self,
        context: &OperationContext,
        predicate: &str,
        value: i64,
    ) -> FleetResult<Vec<Task>> {
        let sql = format!("{TASK_SELECT} WHERE {predicate} = ? ORDER BY k.id");
        let rows = sqlx::query(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        rows.iter().map(Self::row_to_task).collect()
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(job_id = %task.job_id, target_id = %task.target_id))]
    async fn create(&self, task: &NewTask) -> FleetResult<Task> {
        let context = repo_context!(RepositoryOperation::Create, ENTITY).with_additional_info(
            format!("作业: {}, 目标: {}", task.job_id, task.target_id),
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tasks (job_id, target_id, content, state, queue_time)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(task.job_id)
        .bind(task.target_id)
        .bind(&task.content)
        .bind(TaskState::Queued)
        .bind(task.queue_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tag_links::insert_links(&mut *tx, TagLink::Task, id, &task.tag_ids)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = Self::fetch_by_ids(&mut *tx, &context, &[id])
            .await?
            .pop()
            .ok_or_else(|| FleetError::Internal(format!("任务 {id} 写入后未能读回")))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        debug!("创建任务成功: {}", created.entity_description());
        Ok(created)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Task>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = id);
        Ok(self.fetch_where(&context, "k.id", id).await?.pop())
    }

    async fn list(&self) -> FleetResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!("{TASK_SELECT} ORDER BY k.id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn list_by_job(&self, job_id: i64) -> FleetResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY)
            .with_additional_info(format!("作业: {job_id}"));
        self.fetch_where(&context, "k.job_id", job_id).await
    }

    async fn list_by_target(&self, target_id: i64) -> FleetResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY)
            .with_additional_info(format!("目标: {target_id}"));
        self.fetch_where(&context, "k.target_id", target_id).await
    }

    /// 单条条件更新完成比较并交换；并发认领同一任务时只有一条语句会命中
    #[instrument(skip(self, claim_time), fields(task_id = %id))]
    async fn claim(&self, id: i64, claim_time: DateTime<Utc>) -> FleetResult<Option<Task>> {
        let context = repo_context!(RepositoryOperation::Claim, ENTITY, id = id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let claimed: Option<i64> = sqlx::query_scalar(
            "UPDATE tasks SET state = ?, claim_time = ? WHERE id = ? AND state = ? RETURNING id",
        )
        .bind(TaskState::Claimed)
        .bind(claim_time)
        .bind(id)
        .bind(TaskState::Queued)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let task = match claimed {
            Some(id) => Self::fetch_by_ids(&mut *tx, &context, &[id]).await?.pop(),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match &task {
            Some(_) => RepositoryErrorHelpers::log_operation_success(&context, None),
            None => debug!("任务 {} 未处于排队状态或不存在，认领未生效", id),
        }
        Ok(task)
    }

    #[instrument(skip(self, claim_time), fields(target_id = %target_id))]
    async fn claim_queued_for_target(
        &self,
        target_id: i64,
        claim_time: DateTime<Utc>,
    ) -> FleetResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Claim, ENTITY)
            .with_additional_info(format!("目标: {target_id}"));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let ids: Vec<i64> = sqlx::query_scalar(
            "UPDATE tasks SET state = ?, claim_time = ? WHERE target_id = ? AND state = ? RETURNING id",
        )
        .bind(TaskState::Claimed)
        .bind(claim_time)
        .bind(target_id)
        .bind(TaskState::Queued)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let tasks = Self::fetch_by_ids(&mut *tx, &context, &ids).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        debug!("目标 {} 认领了 {} 个任务", target_id, tasks.len());
        Ok(tasks)
    }

    #[instrument(skip(self, result, completed_time), fields(task_id = %result.id))]
    async fn complete(
        &self,
        result: &SubmitTaskResultRequest,
        completed_time: DateTime<Utc>,
    ) -> FleetResult<Option<Task>> {
        let context = repo_context!(RepositoryOperation::Complete, ENTITY, id = result.id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let completed: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE tasks
            SET state = ?, output = ?, error = ?, exec_start_time = ?, exec_stop_time = ?, completed_time = ?
            WHERE id = ? AND state = ?
            RETURNING id
            "#,
        )
        .bind(TaskState::Completed)
        .bind(&result.output)
        .bind(&result.error)
        .bind(result.exec_start_time)
        .bind(result.exec_stop_time)
        .bind(completed_time)
        .bind(result.id)
        .bind(TaskState::Claimed)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let task = match completed {
            Some(id) => Self::fetch_by_ids(&mut *tx, &context, &[id]).await?.pop(),
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if task.is_some() {
            RepositoryErrorHelpers::log_operation_success(&context, None);
        }
        Ok(task)
    }

    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::apply_tags(&self.pool, TagLink::Task, id, tag_ids).await
    }

    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::remove_tags(&self.pool, TagLink::Task, id, tag_ids).await
    }
}
