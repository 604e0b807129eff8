//! Commands accepted by the plan coordinator.

use common::{PlanStatus, UserId};
use serde::{Deserialize, Serialize};

use super::EventId;

/// Create or update a subscriber's plan.
///
/// Only `user_id` is required. Fields left as `None` keep their stored value
/// when the plan exists, and take their defaults when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlan {
    pub user_id: UserId,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub data_allowance: Option<i32>,
    #[serde(default)]
    pub call_minutes: Option<i32>,
    #[serde(default)]
    pub message_count: Option<i32>,
    #[serde(default)]
    pub monthly_fee: Option<f64>,
    #[serde(default)]
    pub status: Option<PlanStatus>,
}

impl ChangePlan {
    /// Creates a command that touches no fields yet.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            plan_name: None,
            data_allowance: None,
            call_minutes: None,
            message_count: None,
            monthly_fee: None,
            status: None,
        }
    }

    /// Creates a command carrying a complete plan.
    pub fn full(
        user_id: impl Into<UserId>,
        plan_name: impl Into<String>,
        data_allowance: i32,
        call_minutes: i32,
        message_count: i32,
        monthly_fee: f64,
    ) -> Self {
        Self::new(user_id)
            .plan_name(plan_name)
            .data_allowance(data_allowance)
            .call_minutes(call_minutes)
            .message_count(message_count)
            .monthly_fee(monthly_fee)
    }

    pub fn plan_name(mut self, plan_name: impl Into<String>) -> Self {
        self.plan_name = Some(plan_name.into());
        self
    }

    pub fn data_allowance(mut self, data_allowance: i32) -> Self {
        self.data_allowance = Some(data_allowance);
        self
    }

    pub fn call_minutes(mut self, call_minutes: i32) -> Self {
        self.call_minutes = Some(call_minutes);
        self
    }

    pub fn message_count(mut self, message_count: i32) -> Self {
        self.message_count = Some(message_count);
        self
    }

    pub fn monthly_fee(mut self, monthly_fee: f64) -> Self {
        self.monthly_fee = Some(monthly_fee);
        self
    }

    pub fn status(mut self, status: PlanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Report absolute usage counters for a subscriber.
///
/// A `None` counter means "unchanged", not zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsage {
    pub user_id: UserId,
    #[serde(default)]
    pub data_usage: Option<i64>,
    #[serde(default)]
    pub call_usage: Option<i64>,
    #[serde(default)]
    pub message_usage: Option<i64>,
}

impl RecordUsage {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            data_usage: None,
            call_usage: None,
            message_usage: None,
        }
    }

    pub fn data_usage(mut self, data_usage: i64) -> Self {
        self.data_usage = Some(data_usage);
        self
    }

    pub fn call_usage(mut self, call_usage: i64) -> Self {
        self.call_usage = Some(call_usage);
        self
    }

    pub fn message_usage(mut self, message_usage: i64) -> Self {
        self.message_usage = Some(message_usage);
        self
    }
}

/// Acknowledgement that a usage event was accepted by the bus.
///
/// It says nothing about when the read side will reflect the usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAck {
    pub success: bool,
    pub message: String,
    pub user_id: UserId,
    pub event_id: EventId,
}
