//! Read side of the phone plan CQRS pipeline.
//!
//! This crate provides:
//! - [`PhonePlanView`], the denormalized per-user projection, and the [`ViewStore`] it lives in
//! - [`PlanProjector`], which applies events idempotently
//! - [`EventProcessor`], a checkpointed, retrying consumer with one task per partition
//! - [`RetryPolicy`] and the [`ProcessorMetrics`] sink injected into each processor
//! - [`PlanQueryService`] for reads

pub mod error;
pub mod processor;
pub mod projector;
pub mod query;
pub mod retry;
pub mod sink;
pub mod store;
pub mod view;

pub use error::{ProjectionError, QueryError, Result, ViewStoreError};
pub use processor::{
    DEFAULT_STALL_BACKOFF, ErrorCallback, EventProcessor, PartitionState, ProcessingFailure,
    ProcessorConfig, ProcessorHandle, ProcessorMonitor,
};
pub use projector::{ApplyOutcome, PlanProjector};
pub use query::PlanQueryService;
pub use retry::{RetryFailure, RetryPolicy, Retryable};
pub use sink::{
    AtomicProcessorMetrics, MetricsSnapshot, ProcessorMetrics, PrometheusProcessorMetrics,
    SkipReason,
};
pub use store::{InMemoryViewStore, ViewStore};
pub use view::PhonePlanView;
