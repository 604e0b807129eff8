//! Phone plan domain events.

use chrono::{DateTime, Utc};
use common::topics::topic_for;
use common::{EventType, PlanStatus, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PhonePlan, RecordUsage};

/// Unique identifier for an event, used for tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Events published by the write side.
///
/// Every payload carries absolute values, never increments, so applying the
/// same event twice leaves a projection exactly as applying it once. Any new
/// variant must keep that property: there is no dedup by event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum PlanEvent {
    /// Full snapshot of a plan after a change.
    #[serde(rename = "PLAN_CHANGED")]
    PlanChanged(PlanChanged),

    /// Latest usage counters for a user.
    #[serde(rename = "USAGE_UPDATED")]
    UsageUpdated(UsageUpdated),
}

/// Data for the PLAN_CHANGED event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChanged {
    pub event_id: EventId,
    pub user_id: UserId,
    pub plan_name: String,
    pub data_allowance: i32,
    pub call_minutes: i32,
    pub message_count: i32,
    pub monthly_fee: f64,
    pub status: PlanStatus,
    pub timestamp: DateTime<Utc>,
}

/// Data for the USAGE_UPDATED event. A `None` counter means "unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageUpdated {
    pub event_id: EventId,
    pub user_id: UserId,
    #[serde(default)]
    pub data_usage: Option<i64>,
    #[serde(default)]
    pub call_usage: Option<i64>,
    #[serde(default)]
    pub message_usage: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl PlanEvent {
    /// Builds a PLAN_CHANGED snapshot of a persisted plan.
    pub fn plan_changed(plan: &PhonePlan) -> Self {
        PlanEvent::PlanChanged(PlanChanged {
            event_id: EventId::new(),
            user_id: plan.user_id.clone(),
            plan_name: plan.plan_name.clone(),
            data_allowance: plan.data_allowance,
            call_minutes: plan.call_minutes,
            message_count: plan.message_count,
            monthly_fee: plan.monthly_fee,
            status: plan.status,
            timestamp: Utc::now(),
        })
    }

    /// Builds a USAGE_UPDATED event from a usage report.
    pub fn usage_updated(cmd: &RecordUsage) -> Self {
        PlanEvent::UsageUpdated(UsageUpdated {
            event_id: EventId::new(),
            user_id: cmd.user_id.clone(),
            data_usage: cmd.data_usage,
            call_usage: cmd.call_usage,
            message_usage: cmd.message_usage,
            timestamp: Utc::now(),
        })
    }

    pub fn event_type(&self) -> EventType {
        match self {
            PlanEvent::PlanChanged(_) => EventType::PlanChanged,
            PlanEvent::UsageUpdated(_) => EventType::UsageUpdated,
        }
    }

    pub fn event_id(&self) -> EventId {
        match self {
            PlanEvent::PlanChanged(e) => e.event_id,
            PlanEvent::UsageUpdated(e) => e.event_id,
        }
    }

    /// The subject of the event, which is also its partition key.
    pub fn user_id(&self) -> &UserId {
        match self {
            PlanEvent::PlanChanged(e) => &e.user_id,
            PlanEvent::UsageUpdated(e) => &e.user_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PlanEvent::PlanChanged(e) => e.timestamp,
            PlanEvent::UsageUpdated(e) => e.timestamp,
        }
    }

    /// Topic this event is published on.
    pub fn topic(&self) -> &'static str {
        topic_for(self.event_type())
    }

    /// Serializes the event to its flat JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an event from its JSON wire form.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
