//! Domain error types.

use common::UserId;
use event_bus::EventBusError;
use thiserror::Error;

/// Errors raised by a plan repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to an aggregate.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// The store could not be reached.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by the command path.
///
/// None of these are retried by the coordinator; they are surfaced to the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced user has no phone plan.
    #[error("Phone plan not found for user {0}")]
    PlanNotFound(UserId),

    /// The command was rejected before any I/O.
    #[error("Invalid command: {0}")]
    Validation(String),

    /// The aggregate could not be read or written.
    #[error("Failed to persist phone plan: {0}")]
    Persistence(#[from] RepositoryError),

    /// The bus rejected the event; nothing was persisted by this command.
    #[error("Failed to publish event: {0}")]
    Publish(#[from] EventBusError),

    /// The aggregate was stored but its event was not published.
    ///
    /// Persistence and publication are not one transaction, so the write and
    /// read sides stay diverged for this user until the next successful change.
    #[error("Phone plan for user {user_id} was saved but its event was not published: {source}")]
    PublishAfterCommit {
        user_id: UserId,
        #[source]
        source: EventBusError,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for the 404-equivalent failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::PlanNotFound(_))
    }

    /// Returns true for persistence or publication failures on the command path.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            DomainError::Persistence(_)
                | DomainError::Publish(_)
                | DomainError::PublishAfterCommit { .. }
                | DomainError::Serialization(_)
        )
    }
}
