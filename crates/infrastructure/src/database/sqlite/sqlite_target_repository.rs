use async_trait::async_trait;
use chrono::Utc;
use fleet_domain::{
    entities::Target,
    repositories::TargetRepository,
    target_query_builder::{TargetQueryBuilder, TargetQueryParam, TARGET_SELECT},
    value_objects::{ClaimTasksRequest, NewTarget, TargetFieldsUpdate},
};
use fleet_errors::FleetResult;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use super::tag_links::{self, TagLink};
use crate::{
    database::mapping::MappingHelpers,
    error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "目标";

pub struct SqliteTargetRepository {
    pool: SqlitePool,
}

impl SqliteTargetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_target(row: &SqliteRow) -> FleetResult<Target> {
        Ok(Target {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            primary_ip: row.try_get("primary_ip")?,
            hostname: row.try_get("hostname")?,
            machine_uuid: row.try_get("machine_uuid")?,
            primary_mac: row.try_get("primary_mac")?,
            public_ip: row.try_get("public_ip")?,
            tag_ids: MappingHelpers::parse_id_list(row, "tag_ids")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn fetch_targets(
        &self,
        context: &OperationContext,
        sql: &str,
        params: Vec<TargetQueryParam>,
    ) -> FleetResult<Vec<Target>> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                TargetQueryParam::Int64(v) => query.bind(v),
                TargetQueryParam::String(v) => query.bind(v),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        rows.iter().map(Self::row_to_target).collect()
    }

    async fn require(&self, context: &OperationContext, id: i64) -> FleetResult<Target> {
        match self.get_by_id(id).await? {
            Some(target) => Ok(target),
            None => Err(RepositoryErrorHelpers::not_found(context)),
        }
    }
}

#[async_trait]
impl TargetRepository for SqliteTargetRepository {
    #[instrument(skip(self, target), fields(
        target_name = %target.name,
        primary_ip = %target.primary_ip,
        tag_count = target.tag_ids.len(),
    ))]
    async fn create(&self, target: &NewTarget) -> FleetResult<Target> {
        target.validate()?;
        let context = repo_context!(RepositoryOperation::Create, ENTITY)
            .with_additional_info(format!("{} ({})", target.name, target.primary_ip));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO targets (name, primary_ip, hostname, machine_uuid, primary_mac, public_ip, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&target.name)
        .bind(&target.primary_ip)
        .bind(&target.hostname)
        .bind(&target.machine_uuid)
        .bind(&target.primary_mac)
        .bind(&target.public_ip)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tag_links::insert_links(&mut *tx, TagLink::Target, id, &target.tag_ids)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = self.require(&context.clone().with_id(id), id).await?;
        RepositoryErrorHelpers::log_operation_success(
            &context.with_id(id),
            Some(&created.entity_description()),
        );
        Ok(created)
    }

    #[instrument(skip(self), fields(target_id = %id))]
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Target>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = id);
        let sql = format!("{TARGET_SELECT} WHERE t.id = ?");

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => Ok(Some(Self::row_to_target(&row)?)),
            None => {
                debug!("查询目标不存在: ID {}", id);
                Ok(None)
            }
        }
    }

    async fn list(&self) -> FleetResult<Vec<Target>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let sql = format!("{TARGET_SELECT} ORDER BY t.id");
        self.fetch_targets(&context, &sql, Vec::new()).await
    }

    #[instrument(skip(self, update), fields(target_id = %id))]
    async fn update_fields(&self, id: i64, update: &TargetFieldsUpdate) -> FleetResult<Target> {
        update.validate()?;
        let context = repo_context!(RepositoryOperation::Update, ENTITY, id = id);

        if update.is_empty() {
            return self.require(&context, id).await;
        }

        let result = sqlx::query(
            r#"
            UPDATE targets SET
                name = COALESCE(?, name),
                primary_ip = COALESCE(?, primary_ip),
                hostname = COALESCE(?, hostname),
                machine_uuid = COALESCE(?, machine_uuid),
                primary_mac = COALESCE(?, primary_mac),
                public_ip = COALESCE(?, public_ip)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.primary_ip)
        .bind(&update.hostname)
        .bind(&update.machine_uuid)
        .bind(&update.primary_mac)
        .bind(&update.public_ip)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryErrorHelpers::not_found(&context));
        }

        let updated = self.require(&context, id).await?;
        RepositoryErrorHelpers::log_operation_success(&context, Some(&updated.entity_description()));
        Ok(updated)
    }

    #[instrument(skip(self), fields(target_id = %id))]
    async fn delete(&self, id: i64) -> FleetResult<()> {
        let context = repo_context!(RepositoryOperation::Delete, ENTITY, id = id);

        let result = sqlx::query("DELETE FROM targets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryErrorHelpers::not_found(&context));
        }

        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(())
    }

    #[instrument(skip(self, tag_ids), fields(tag_ids = ?tag_ids))]
    async fn find_with_all_tags(&self, tag_ids: &[i64]) -> FleetResult<Vec<Target>> {
        let Some((sql, params)) = TargetQueryBuilder::build_all_tags_query(tag_ids) else {
            debug!("标签选择器为空，返回空目标集合");
            return Ok(Vec::new());
        };

        let context = repo_context!(RepositoryOperation::Query, ENTITY)
            .with_additional_info(format!("标签: {tag_ids:?}"));
        let targets = self.fetch_targets(&context, &sql, params).await?;
        debug!("标签 {:?} 匹配到 {} 个目标", tag_ids, targets.len());
        Ok(targets)
    }

    #[instrument(skip(self, filter), fields(filter = %filter.describe()))]
    async fn find_by_host(&self, filter: &ClaimTasksRequest) -> FleetResult<Vec<Target>> {
        let Some((sql, params)) = TargetQueryBuilder::build_host_query(filter) else {
            return Ok(Vec::new());
        };

        let context = repo_context!(RepositoryOperation::Query, ENTITY)
            .with_additional_info(filter.describe());
        self.fetch_targets(&context, &sql, params).await
    }

    async fn add_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::apply_tags(&self.pool, TagLink::Target, id, tag_ids).await
    }

    async fn remove_tags(&self, id: i64, tag_ids: &[i64]) -> FleetResult<()> {
        tag_links::remove_tags(&self.pool, TagLink::Target, id, tag_ids).await
    }
}
