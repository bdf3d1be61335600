//! PostgreSQL-backed repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use uuid::Uuid;

use beacon_common::error::AppError;
use beacon_common::types::{DispatchFailure, DispatchSummary, ServiceRequest, WorkerLocation};

use super::{ProfileStore, RequestStore, WorkerStore};

/// Create a PostgreSQL connection pool.
///
/// `max_connections` controls the maximum number of connections in the pool.
/// Pass `AppConfig::db_max_connections` for the user-configured value (default 20).
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// All relational repositories over one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl WorkerStore for PgStore {
    async fn find_active_by_geohash_prefix(
        &self,
        service: &str,
        prefix: &str,
    ) -> Result<Vec<WorkerLocation>, AppError> {
        let rows: Vec<WorkerLocation> = sqlx::query_as(
            r#"
            SELECT *
            FROM worker_locations
            WHERE service = $1
              AND active = true
              AND geohash LIKE $2 || '%'
            "#,
        )
        .bind(service)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn upsert(&self, location: &WorkerLocation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO worker_locations
                (worker_id, latitude, longitude, geohash, service, token,
                 active, last_error, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (worker_id) DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                geohash = EXCLUDED.geohash,
                service = EXCLUDED.service,
                token = EXCLUDED.token,
                active = EXCLUDED.active,
                last_error = EXCLUDED.last_error,
                last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(location.worker_id)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.geohash)
        .bind(&location.service)
        .bind(&location.token)
        .bind(location.active)
        .bind(&location.last_error)
        .bind(location.last_updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_tokens(&self, tokens: &[String], reason: &str) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE worker_locations
            SET active = false, last_error = $2
            WHERE token = ANY($1)
            "#,
        )
        .bind(tokens.to_vec())
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM worker_locations WHERE last_updated < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn set_push_token(&self, user_id: Uuid, token: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, fcm_token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET fcm_token = EXCLUDED.fcm_token, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RequestStore for PgStore {
    async fn get(&self, id: Uuid) -> Result<Option<ServiceRequest>, AppError> {
        let request: Option<ServiceRequest> =
            sqlx::query_as("SELECT * FROM service_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(request)
    }

    async fn record_dispatch_result(
        &self,
        id: Uuid,
        summary: &DispatchSummary,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE service_requests
            SET dispatch_result = $2
            WHERE id = $1
              AND dispatch_result IS NULL
              AND dispatch_error IS NULL
            "#,
        )
        .bind(id)
        .bind(Json(summary))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Request {} not found or already annotated",
                id
            )));
        }
        Ok(())
    }

    async fn record_dispatch_error(
        &self,
        id: Uuid,
        failure: &DispatchFailure,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE service_requests
            SET dispatch_error = $2
            WHERE id = $1
              AND dispatch_result IS NULL
              AND dispatch_error IS NULL
            "#,
        )
        .bind(id)
        .bind(Json(failure))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Request {} not found or already annotated",
                id
            )));
        }
        Ok(())
    }
}
