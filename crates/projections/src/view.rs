//! The denormalized phone plan view.

use chrono::{DateTime, Utc};
use common::{PlanStatus, UserId};
use domain::{PlanChanged, UsageUpdated};
use serde::{Deserialize, Serialize};

/// Read-side view of one subscriber: latest plan attributes plus latest usage.
///
/// Created on the first PLAN_CHANGED for the user. Usage counters stay `None`
/// until a USAGE_UPDATED carrying them is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePlanView {
    pub user_id: UserId,
    pub plan_name: String,
    pub data_allowance: i32,
    pub call_minutes: i32,
    pub message_count: i32,
    pub monthly_fee: f64,
    pub status: PlanStatus,
    pub data_usage: Option<i64>,
    pub call_usage: Option<i64>,
    pub message_usage: Option<i64>,
    /// Timestamp of the newest event applied to this view.
    pub last_event_at: DateTime<Utc>,
}

impl PhonePlanView {
    /// Builds a fresh view from a plan snapshot.
    pub fn from_plan_changed(event: &PlanChanged) -> Self {
        Self {
            user_id: event.user_id.clone(),
            plan_name: event.plan_name.clone(),
            data_allowance: event.data_allowance,
            call_minutes: event.call_minutes,
            message_count: event.message_count,
            monthly_fee: event.monthly_fee,
            status: event.status,
            data_usage: None,
            call_usage: None,
            message_usage: None,
            last_event_at: event.timestamp,
        }
    }

    /// Overwrites every plan attribute from the snapshot. Usage is untouched.
    pub fn apply_plan_changed(&mut self, event: &PlanChanged) {
        self.plan_name = event.plan_name.clone();
        self.data_allowance = event.data_allowance;
        self.call_minutes = event.call_minutes;
        self.message_count = event.message_count;
        self.monthly_fee = event.monthly_fee;
        self.status = event.status;
        self.touch(event.timestamp);
    }

    /// Overwrites only the usage counters the event carries.
    pub fn apply_usage(&mut self, event: &UsageUpdated) {
        if let Some(data_usage) = event.data_usage {
            self.data_usage = Some(data_usage);
        }
        if let Some(call_usage) = event.call_usage {
            self.call_usage = Some(call_usage);
        }
        if let Some(message_usage) = event.message_usage {
            self.message_usage = Some(message_usage);
        }
        self.touch(event.timestamp);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_event_at = self.last_event_at.max(at);
    }
}
