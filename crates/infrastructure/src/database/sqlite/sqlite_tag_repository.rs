use std::collections::HashMap;

use async_trait::async_trait;
use fleet_domain::{entities::Tag, repositories::TagRepository};
use fleet_errors::{FleetError, FleetResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::{
    database::mapping::MappingHelpers,
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "标签";

pub struct SqliteTagRepository {
    pool: SqlitePool,
}

impl SqliteTagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_tag(row: &SqliteRow) -> FleetResult<Tag> {
        Ok(Tag {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    fn normalize(name: &str) -> FleetResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FleetError::validation_error("标签名称不能为空"));
        }
        Ok(name.to_string())
    }
}

#[async_trait]
impl TagRepository for SqliteTagRepository {
    #[instrument(skip(self), fields(tag_name = %name))]
    async fn create(&self, name: &str) -> FleetResult<Tag> {
        let name = Self::normalize(name)?;
        let context = repo_context!(RepositoryOperation::Create, ENTITY)
            .with_additional_info(name.clone());

        let row = sqlx::query("INSERT INTO tags (name) VALUES (?) RETURNING id, name")
            .bind(&name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let tag = Self::row_to_tag(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context.with_id(tag.id), None);
        Ok(tag)
    }

    #[instrument(skip(self, names), fields(name_count = names.len()))]
    async fn get_or_create_many(&self, names: &[String]) -> FleetResult<Vec<Tag>> {
        let mut distinct: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = Self::normalize(name)?;
            if !distinct.contains(&name) {
                distinct.push(name);
            }
        }
        if distinct.is_empty() {
            return Ok(Vec::new());
        }

        let context = repo_context!(RepositoryOperation::Create, ENTITY)
            .with_additional_info(format!("{distinct:?}"));

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let mut created = 0u64;
        for name in &distinct {
            let result = sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
            created += result.rows_affected();
        }

        let sql = format!(
            "SELECT id, name FROM tags WHERE name IN ({})",
            MappingHelpers::placeholders(distinct.len())
        );
        let mut query = sqlx::query(&sql);
        for name in &distinct {
            query = query.bind(name);
        }
        let rows = query
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let mut by_name: HashMap<String, Tag> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let tag = Self::row_to_tag(row)?;
            by_name.insert(tag.name.clone(), tag);
        }

        // 保持输入顺序
        let tags = distinct
            .iter()
            .map(|name| {
                by_name.remove(name).ok_or_else(|| {
                    FleetError::Internal(format!("标签 '{name}' 写入后未能读回"))
                })
            })
            .collect::<FleetResult<Vec<_>>>()?;

        debug!("批量获取或创建标签: 共 {} 个, 新建 {} 个", tags.len(), created);
        Ok(tags)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Tag>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = id);
        let row = sqlx::query("SELECT id, name FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.as_ref().map(Self::row_to_tag).transpose()
    }

    async fn get_by_name(&self, name: &str) -> FleetResult<Option<Tag>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY)
            .with_additional_info(name.to_string());
        let row = sqlx::query("SELECT id, name FROM tags WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.as_ref().map(Self::row_to_tag).transpose()
    }

    async fn list(&self) -> FleetResult<Vec<Tag>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let rows = sqlx::query("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_tag).collect()
    }
}
