//! Topic and consumer group names shared by publishers and consumers.

use crate::EventType;

/// Topic carrying `PLAN_CHANGED` events.
pub const PLAN_TOPIC: &str = "phone-plan-events";

/// Topic carrying `USAGE_UPDATED` events.
pub const USAGE_TOPIC: &str = "usage-events";

/// Consumer group used by the read side unless configured otherwise.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Returns the topic an event type is published on.
pub fn topic_for(event_type: EventType) -> &'static str {
    match event_type {
        EventType::PlanChanged => PLAN_TOPIC,
        EventType::UsageUpdated => USAGE_TOPIC,
    }
}
