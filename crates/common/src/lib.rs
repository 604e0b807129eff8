//! Shared types for the phone plan CQRS pipeline.
//!
//! Both the write side (`domain`) and the read side (`projections`) depend on
//! these identifiers, so they live in a crate of their own.

pub mod event_type;
pub mod topics;
pub mod types;

pub use event_type::{EventType, UnknownEventType};
pub use types::{InvalidPlanStatus, PlanStatus, UserId};
