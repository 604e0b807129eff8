use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of event kinds carried on the bus.
///
/// The tag travels out-of-band on every bus message so a consumer can route or
/// filter before deserializing the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "PLAN_CHANGED")]
    PlanChanged,
    #[serde(rename = "USAGE_UPDATED")]
    UsageUpdated,
}

impl EventType {
    /// Returns the wire tag for this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PlanChanged => "PLAN_CHANGED",
            EventType::UsageUpdated => "USAGE_UPDATED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a message carries a tag outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown event type tag: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAN_CHANGED" => Ok(EventType::PlanChanged),
            "USAGE_UPDATED" => Ok(EventType::UsageUpdated),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}
