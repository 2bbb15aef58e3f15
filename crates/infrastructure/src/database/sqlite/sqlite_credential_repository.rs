use async_trait::async_trait;
use fleet_domain::{entities::Credential, repositories::CredentialRepository};
use fleet_errors::FleetResult;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "凭据";

pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_credential(row: &SqliteRow) -> FleetResult<Credential> {
        Ok(Credential {
            id: row.try_get("id")?,
            target_id: row.try_get("target_id")?,
            principal: row.try_get("principal")?,
            secret: row.try_get("secret")?,
            fails: row.try_get("fails")?,
        })
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    #[instrument(skip(self, principal, secret), fields(target_id = %target_id))]
    async fn create(
        &self,
        target_id: i64,
        principal: &str,
        secret: &str,
    ) -> FleetResult<Credential> {
        let context = repo_context!(RepositoryOperation::Create, ENTITY)
            .with_additional_info(format!("目标: {target_id}, 主体: {principal}"));

        let row = sqlx::query(
            r#"
            INSERT INTO credentials (target_id, principal, secret, fails)
            VALUES (?, ?, ?, 0)
            RETURNING id, target_id, principal, secret, fails
            "#,
        )
        .bind(target_id)
        .bind(principal)
        .bind(secret)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let credential = Self::row_to_credential(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context.with_id(credential.id), None);
        Ok(credential)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Credential>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = id);
        let row = sqlx::query(
            "SELECT id, target_id, principal, secret, fails FROM credentials WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.as_ref().map(Self::row_to_credential).transpose()
    }

    async fn list(&self) -> FleetResult<Vec<Credential>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let rows = sqlx::query(
            "SELECT id, target_id, principal, secret, fails FROM credentials ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_credential).collect()
    }

    async fn list_by_target(&self, target_id: i64) -> FleetResult<Vec<Credential>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY)
            .with_additional_info(format!("目标: {target_id}"));
        let rows = sqlx::query(
            "SELECT id, target_id, principal, secret, fails FROM credentials WHERE target_id = ? ORDER BY id",
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_credential).collect()
    }

    #[instrument(skip(self), fields(credential_id = %id))]
    async fn increment_fails(&self, id: i64) -> FleetResult<Option<i64>> {
        let context = repo_context!(RepositoryOperation::Update, ENTITY, id = id);

        let fails: Option<i64> =
            sqlx::query_scalar("UPDATE credentials SET fails = fails + 1 WHERE id = ? RETURNING fails")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if let Some(fails) = fails {
            debug!("凭据 {} 失败计数更新为 {}", id, fails);
        }
        Ok(fails)
    }
}
