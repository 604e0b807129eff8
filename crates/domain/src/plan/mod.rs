//! Phone plan aggregate and its command path.

mod aggregate;
mod commands;
mod events;
mod postgres;
mod repository;
mod service;

pub use aggregate::PhonePlan;
pub use commands::{ChangePlan, RecordUsage, UsageAck};
pub use events::{EventId, PlanChanged, PlanEvent, UsageUpdated};
pub use postgres::PostgresPlanRepository;
pub use repository::{InMemoryPlanRepository, PlanRepository};
pub use service::PlanCommandService;
