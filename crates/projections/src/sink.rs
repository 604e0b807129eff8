//! Metrics sink for processing outcomes, injected into each event processor.

use std::sync::atomic::{AtomicU64, Ordering};

use common::EventType;

/// Why an event was passed over without touching the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The payload or tag could not be decoded.
    Malformed,
    /// The out-of-band tag belongs to another processor.
    ForeignEventType,
    /// Usage arrived before the user's plan view existed.
    UnknownUser,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Malformed => "malformed",
            SkipReason::ForeignEventType => "foreign_event_type",
            SkipReason::UnknownUser => "unknown_user",
        }
    }
}

/// Sink for processor outcomes. Implementations must be cheap and thread safe.
pub trait ProcessorMetrics: Send + Sync {
    /// An event was applied and checkpointed.
    fn event_processed(&self, topic: &str, event_type: EventType);

    /// Applying an event failed after every retry.
    fn event_failed(&self, topic: &str, event_type: EventType);

    /// An event was skipped; its checkpoint still advanced.
    fn event_skipped(&self, topic: &str, reason: SkipReason);
}

impl<T: ProcessorMetrics + ?Sized> ProcessorMetrics for std::sync::Arc<T> {
    fn event_processed(&self, topic: &str, event_type: EventType) {
        (**self).event_processed(topic, event_type)
    }

    fn event_failed(&self, topic: &str, event_type: EventType) {
        (**self).event_failed(topic, event_type)
    }

    fn event_skipped(&self, topic: &str, reason: SkipReason) {
        (**self).event_skipped(topic, reason)
    }
}

/// Point-in-time copy of [`AtomicProcessorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub plan_events_processed: u64,
    pub usage_events_processed: u64,
    pub plan_event_errors: u64,
    pub usage_event_errors: u64,
    pub events_skipped: u64,
}

/// Counters held in atomics, readable at any time.
#[derive(Debug, Default)]
pub struct AtomicProcessorMetrics {
    plan_processed: AtomicU64,
    usage_processed: AtomicU64,
    plan_errors: AtomicU64,
    usage_errors: AtomicU64,
    skipped: AtomicU64,
}

impl AtomicProcessorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            plan_events_processed: self.plan_processed.load(Ordering::Relaxed),
            usage_events_processed: self.usage_processed.load(Ordering::Relaxed),
            plan_event_errors: self.plan_errors.load(Ordering::Relaxed),
            usage_event_errors: self.usage_errors.load(Ordering::Relaxed),
            events_skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    /// One-line human-readable summary for logs.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Plan events (processed: {}, errors: {}), usage events (processed: {}, errors: {}), skipped: {}",
            s.plan_events_processed,
            s.plan_event_errors,
            s.usage_events_processed,
            s.usage_event_errors,
            s.events_skipped
        )
    }
}

impl ProcessorMetrics for AtomicProcessorMetrics {
    fn event_processed(&self, _topic: &str, event_type: EventType) {
        match event_type {
            EventType::PlanChanged => &self.plan_processed,
            EventType::UsageUpdated => &self.usage_processed,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    fn event_failed(&self, _topic: &str, event_type: EventType) {
        match event_type {
            EventType::PlanChanged => &self.plan_errors,
            EventType::UsageUpdated => &self.usage_errors,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    fn event_skipped(&self, _topic: &str, _reason: SkipReason) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Forwards outcomes to the global `metrics` recorder, labelled by topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusProcessorMetrics;

impl ProcessorMetrics for PrometheusProcessorMetrics {
    fn event_processed(&self, topic: &str, event_type: EventType) {
        metrics::counter!(
            "projection_events_processed_total",
            "topic" => topic.to_string(),
            "event_type" => event_type.as_str()
        )
        .increment(1);
    }

    fn event_failed(&self, topic: &str, event_type: EventType) {
        metrics::counter!(
            "projection_event_errors_total",
            "topic" => topic.to_string(),
            "event_type" => event_type.as_str()
        )
        .increment(1);
    }

    fn event_skipped(&self, topic: &str, reason: SkipReason) {
        metrics::counter!(
            "projection_events_skipped_total",
            "topic" => topic.to_string(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }
}
