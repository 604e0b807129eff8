use thiserror::Error;

use crate::PartitionId;

/// Errors raised by the bus client and the checkpoint store.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The serialized event exceeds the bus message size bound.
    #[error("Event payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// The transport could not be reached after the client's own retries.
    #[error("Event bus unavailable: {0}")]
    TransportUnavailable(String),

    /// The topic is not known to the bus.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// The partition does not exist on the topic.
    #[error("Unknown partition {partition} on topic {topic}")]
    UnknownPartition {
        topic: String,
        partition: PartitionId,
    },

    /// A database error occurred in a durable checkpoint store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for bus and checkpoint operations.
pub type Result<T> = std::result::Result<T, EventBusError>;
