use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_domain::{entities::Job, repositories::JobRepository, value_objects::CreateJobRequest};
use fleet_errors::{FleetError, FleetResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use super::tag_links::{self, TagLink};
use crate::{
    database::mapping::MappingHelpers,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "作业";

const JOB_SELECT: &str = "SELECT j.id, j.name, j.content, j.created_at, j.prev_id, \
(SELECT group_concat(jt.tag_id) FROM job_tags jt WHERE jt.job_id = j.id) AS tag_ids \
FROM jobs j";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &SqliteRow) -> FleetResult<Job> {
        Ok(Job {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            prev_id: row.try_get("prev_id")?,
            tag_ids: MappingHelpers::parse_id_list(row, "tag_ids")?,
        })
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, request), fields(
        job_name = %request.name,
        tag_ids = ?request.tag_ids,
        prev_job_id = ?request.prev_job_id,
    ))]
    async fn create(
        &self,
        request: &CreateJobRequest,
        created_at: DateTime<Utc>,
    ) -> FleetResult<Job> {
        let context = repo_context!(RepositoryOperation::Create, ENTITY)
            .with_additional_info(request.name.clone());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO jobs (name, content, created_at, prev_id) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&request.name)
        .bind(&request.content)
        .bind(created_at)
        .bind(request.prev_job_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tag_links::insert_links(&mut *tx, TagLink::Job, id, &request.tag_ids)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let job = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| FleetError::Internal(format!("作业 {id} 写入后未能读回")))?;
        RepositoryErrorHelpers::log_operation_success(
            &context.with_id(id),
            Some(&job.entity_description()),
        );
        Ok(job)
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Job>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = id);
        let sql = format!("{JOB_SELECT} WHERE j.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_job(&row)?)),
            None => {
                debug!("查询作业不存在: ID {}", id);
                Ok(None)
            }
        }
    }

    async fn list(&self) -> FleetResult<Vec<Job>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!("{JOB_SELECT} ORDER BY j.id");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn find_next(&self, id: i64) -> FleetResult<Option<Job>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY, id = id);
        // 多个作业指向同一前驱时取最早创建的一个
        let sql = format!("{JOB_SELECT} WHERE j.prev_id = ? ORDER BY j.id LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::apply_tags(&self.pool, TagLink::Job, id, tag_ids).await
    }

    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::remove_tags(&self.pool, TagLink::Job, id, tag_ids).await
    }
}
