//! Process wiring: stores, bus, and the two event processors.

use std::sync::Arc;

use common::EventType;
use domain::{InMemoryPlanRepository, PlanRepository, PostgresPlanRepository};
use event_bus::{CheckpointStore, EventBus, InMemoryCheckpointStore, InMemoryEventBus};
use projections::{
    EventProcessor, InMemoryViewStore, ProcessorConfig, ProcessorHandle, ProjectionError,
    ViewStore,
};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::Config;
use crate::routes::plans::AppState;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to start event processor: {0}")]
    Processor(#[from] ProjectionError),
}

/// Every collaborator of the write and read sides.
///
/// The bus lives in this process, so checkpoints and views are kept in memory
/// alongside it: their positions are meaningless once the bus log is gone.
#[derive(Clone)]
pub struct Pipeline {
    pub repository: Arc<dyn PlanRepository>,
    pub bus: Arc<dyn EventBus>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub views: Arc<dyn ViewStore>,
}

impl Pipeline {
    /// Builds a pipeline over the given plan repository.
    pub fn new(config: &Config, repository: Arc<dyn PlanRepository>) -> Self {
        let bus = InMemoryEventBus::with_default_topics(config.partition_count)
            .with_max_payload_bytes(config.max_event_bytes);
        Self {
            repository,
            bus: Arc::new(bus),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            views: Arc::new(InMemoryViewStore::new()),
        }
    }

    /// Builds a fully in-memory pipeline.
    pub fn in_memory(config: &Config) -> Self {
        Self::new(config, Arc::new(InMemoryPlanRepository::new()))
    }

    /// Uses PostgreSQL for plans when `DATABASE_URL` is set, memory otherwise.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::info!("DATABASE_URL not set, using in-memory plan repository");
            return Ok(Self::in_memory(config));
        };

        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        let repository = PostgresPlanRepository::new(pool);
        repository.run_migrations().await?;
        tracing::info!("connected to PostgreSQL plan repository");

        Ok(Self::new(config, Arc::new(repository)))
    }

    /// Handler state sharing this pipeline's stores and watching `processors`.
    pub fn state(&self, processors: &[ProcessorHandle]) -> Arc<AppState> {
        let state = AppState::new(
            self.repository.clone(),
            self.bus.clone(),
            self.views.clone(),
        )
        .with_processors(processors.iter().map(ProcessorHandle::monitor).collect());
        Arc::new(state)
    }

    /// Starts the plan and usage processors.
    pub fn start_processors(&self, config: &Config) -> Result<Vec<ProcessorHandle>, StartupError> {
        [EventType::PlanChanged, EventType::UsageUpdated]
            .into_iter()
            .map(|event_type| {
                let processor_config = ProcessorConfig::for_event_type(event_type)
                    .consumer_group(config.consumer_group.clone())
                    .retry_policy(config.retry_policy())
                    .stall_backoff(config.stall_backoff);

                EventProcessor::new(
                    self.bus.clone(),
                    self.checkpoints.clone(),
                    self.views.clone(),
                    processor_config,
                )
                .on_error(|failure| {
                    tracing::error!(
                        topic = %failure.topic,
                        partition = %failure.partition,
                        offset = ?failure.offset,
                        error = %failure.error,
                        "event processing failed"
                    );
                })
                .start()
                .map_err(StartupError::from)
            })
            .collect()
    }
}
