use async_trait::async_trait;
use sqlx::PgPool;

use crate::{Offset, PartitionId, Result, checkpoint::CheckpointStore};

/// PostgreSQL-backed checkpoint store.
#[derive(Clone)]
pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    /// Creates a new PostgreSQL checkpoint store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn load(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
    ) -> Result<Option<Offset>> {
        let position: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT position FROM event_checkpoints
            WHERE topic = $1 AND partition_id = $2 AND consumer_group = $3
            "#,
        )
        .bind(topic)
        .bind(partition.as_u32() as i32)
        .bind(consumer_group)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position.map(|p| Offset::new(p as u64)))
    }

    async fn store(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
        offset: Offset,
    ) -> Result<()> {
        let start = std::time::Instant::now();

        sqlx::query(
            r#"
            INSERT INTO event_checkpoints (topic, partition_id, consumer_group, position, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (topic, partition_id, consumer_group)
            DO UPDATE SET
                position = GREATEST(event_checkpoints.position, EXCLUDED.position),
                updated_at = NOW()
            "#,
        )
        .bind(topic)
        .bind(partition.as_u32() as i32)
        .bind(consumer_group)
        .bind(offset.as_u64() as i64)
        .execute(&self.pool)
        .await?;

        metrics::histogram!("checkpoint_store_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        Ok(())
    }
}
