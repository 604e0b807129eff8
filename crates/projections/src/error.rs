//! Projection error types.

use common::UserId;
use event_bus::{EventBusError, Offset, PartitionId};
use thiserror::Error;

/// Errors raised by a view store.
#[derive(Debug, Clone, Error)]
pub enum ViewStoreError {
    /// The store could not be reached; the same write may succeed later.
    #[error("View store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write; retrying will not help.
    #[error("View store rejected write: {0}")]
    Rejected(String),
}

impl ViewStoreError {
    /// Only transient failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ViewStoreError::Unavailable(_))
    }
}

/// Errors that can occur while consuming events into the projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The payload could not be decoded into a known event.
    #[error("Malformed event at {topic}/{partition}@{offset}: {reason}")]
    MalformedEvent {
        topic: String,
        partition: PartitionId,
        offset: Offset,
        reason: String,
    },

    /// The bus or checkpoint store failed.
    #[error("Event bus error: {0}")]
    Bus(#[from] EventBusError),

    /// Every allowed attempt to apply an event failed.
    #[error("Apply failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ViewStoreError,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// Errors returned by the query path.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No projection exists for the user yet.
    #[error("Phone plan view not found for user {0}")]
    NotFound(UserId),

    /// The projection store failed.
    #[error("View store error: {0}")]
    Store(#[from] ViewStoreError),
}
