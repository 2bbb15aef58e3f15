use async_trait::async_trait;
use chrono::Utc;
use fleet_domain::{entities::Identity, repositories::IdentityRepository};
use fleet_errors::FleetResult;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::instrument;

use crate::{
    error_handling::{RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

const ENTITY: &str = "身份";

pub struct SqliteIdentityRepository {
    pool: SqlitePool,
}

impl SqliteIdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_identity(row: &SqliteRow) -> FleetResult<Identity> {
        Ok(Identity {
            public_key: row.try_get("public_key")?,
            service: row.try_get("service")?,
            target_id: row.try_get("target_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl IdentityRepository for SqliteIdentityRepository {
    #[instrument(skip(self, public_key), fields(service = %service, target_id = ?target_id))]
    async fn register(
        &self,
        service: &str,
        public_key: &str,
        target_id: Option<i64>,
    ) -> FleetResult<Identity> {
        let context = repo_context!(RepositoryOperation::Create, ENTITY, id = public_key);

        let row = sqlx::query(
            r#"
            INSERT INTO identities (public_key, service, target_id, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (public_key) DO UPDATE SET
                service = excluded.service,
                target_id = excluded.target_id
            RETURNING public_key, service, target_id, created_at
            "#,
        )
        .bind(public_key)
        .bind(service)
        .bind(target_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let identity = Self::row_to_identity(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(identity)
    }

    async fn find(&self, service: &str, public_key: &str) -> FleetResult<Option<Identity>> {
        let context = repo_context!(RepositoryOperation::Read, ENTITY, id = public_key);
        let row = sqlx::query(
            "SELECT public_key, service, target_id, created_at FROM identities WHERE public_key = ? AND service = ?",
        )
        .bind(public_key)
        .bind(service)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        row.as_ref().map(Self::row_to_identity).transpose()
    }

    async fn list(&self) -> FleetResult<Vec<Identity>> {
        let context = repo_context!(RepositoryOperation::Query, ENTITY);
        let rows = sqlx::query(
            "SELECT public_key, service, target_id, created_at FROM identities ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        rows.iter().map(Self::row_to_identity).collect()
    }

    async fn revoke(&self, public_key: &str) -> FleetResult<bool> {
        let context = repo_context!(RepositoryOperation::Delete, ENTITY, id = public_key);
        let result = sqlx::query("DELETE FROM identities WHERE public_key = ?")
            .bind(public_key)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        Ok(result.rows_affected() > 0)
    }
}
