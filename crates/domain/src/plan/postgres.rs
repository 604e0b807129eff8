//! PostgreSQL-backed plan repository.

use async_trait::async_trait;
use common::{PlanStatus, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{PhonePlan, PlanRepository};
use crate::error::RepositoryError;

/// PostgreSQL-backed plan repository (table `phone_plans`).
#[derive(Clone)]
pub struct PostgresPlanRepository {
    pool: PgPool,
}

impl PostgresPlanRepository {
    /// Creates a new PostgreSQL plan repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_plan(row: PgRow) -> Result<PhonePlan, RepositoryError> {
        let status: String = row.try_get("status")?;
        let status: PlanStatus = status
            .parse()
            .map_err(|e: common::InvalidPlanStatus| RepositoryError::InvalidRow(e.to_string()))?;

        Ok(PhonePlan {
            user_id: UserId::new(row.try_get::<String, _>("user_id")?),
            plan_name: row.try_get("plan_name")?,
            data_allowance: row.try_get("data_allowance")?,
            call_minutes: row.try_get("call_minutes")?,
            message_count: row.try_get("message_count")?,
            monthly_fee: row.try_get("monthly_fee")?,
            status,
        })
    }
}

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<PhonePlan>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, plan_name, data_allowance, call_minutes, message_count, monthly_fee, status
            FROM phone_plans
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_plan).transpose()
    }

    async fn upsert(&self, plan: &PhonePlan) -> Result<PhonePlan, RepositoryError> {
        let start = std::time::Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO phone_plans (user_id, plan_name, data_allowance, call_minutes, message_count, monthly_fee, status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                plan_name = EXCLUDED.plan_name,
                data_allowance = EXCLUDED.data_allowance,
                call_minutes = EXCLUDED.call_minutes,
                message_count = EXCLUDED.message_count,
                monthly_fee = EXCLUDED.monthly_fee,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING user_id, plan_name, data_allowance, call_minutes, message_count, monthly_fee, status
            "#,
        )
        .bind(plan.user_id.as_str())
        .bind(&plan.plan_name)
        .bind(plan.data_allowance)
        .bind(plan.call_minutes)
        .bind(plan.message_count)
        .bind(plan.monthly_fee)
        .bind(plan.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        metrics::histogram!("plan_repository_upsert_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        Self::row_to_plan(row)
    }
}
