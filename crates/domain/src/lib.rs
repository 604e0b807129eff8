//! Write side of the phone plan CQRS pipeline.
//!
//! This crate provides:
//! - the `PhonePlan` aggregate and its merge-on-upsert rules
//! - `PlanEvent`, the tagged union of events published to the bus
//! - `PlanRepository` with in-memory and PostgreSQL implementations
//! - `PlanCommandService`, which persists aggregates and publishes their events

pub mod error;
pub mod plan;

pub use error::{DomainError, RepositoryError};
pub use plan::{
    ChangePlan, EventId, InMemoryPlanRepository, PhonePlan, PlanChanged, PlanCommandService,
    PlanEvent, PlanRepository, PostgresPlanRepository, RecordUsage, UsageAck, UsageUpdated,
};
