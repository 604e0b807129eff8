//! Phone plan aggregate.

use common::{PlanStatus, UserId};
use serde::{Deserialize, Serialize};

use super::ChangePlan;

/// The authoritative write-side record of one subscriber's plan.
///
/// One row per user id; rows are upserted and never deleted. Usage is not
/// tracked here, only on the read side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonePlan {
    pub user_id: UserId,
    pub plan_name: String,
    pub data_allowance: i32,
    pub call_minutes: i32,
    pub message_count: i32,
    pub monthly_fee: f64,
    pub status: PlanStatus,
}

impl PhonePlan {
    /// Builds a new aggregate from a command. Missing fields take their defaults
    /// and the status falls back to `ACTIVE`.
    pub fn create(cmd: &ChangePlan) -> Self {
        Self {
            user_id: cmd.user_id.clone(),
            plan_name: cmd.plan_name.clone().unwrap_or_default(),
            data_allowance: cmd.data_allowance.unwrap_or_default(),
            call_minutes: cmd.call_minutes.unwrap_or_default(),
            message_count: cmd.message_count.unwrap_or_default(),
            monthly_fee: cmd.monthly_fee.unwrap_or_default(),
            status: cmd.status.unwrap_or_default(),
        }
    }

    /// Overwrites the fields the command provides, keeping everything else.
    pub fn merge(&mut self, cmd: &ChangePlan) {
        if let Some(plan_name) = &cmd.plan_name {
            self.plan_name = plan_name.clone();
        }
        if let Some(data_allowance) = cmd.data_allowance {
            self.data_allowance = data_allowance;
        }
        if let Some(call_minutes) = cmd.call_minutes {
            self.call_minutes = call_minutes;
        }
        if let Some(message_count) = cmd.message_count {
            self.message_count = message_count;
        }
        if let Some(monthly_fee) = cmd.monthly_fee {
            self.monthly_fee = monthly_fee;
        }
        if let Some(status) = cmd.status {
            self.status = status;
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PlanStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_status_to_active() {
        let plan = PhonePlan::create(&ChangePlan::full("u1", "Basic", 10240, 200, 100, 45000.0));
        assert_eq!(plan.status, PlanStatus::Active);
        assert_eq!(plan.plan_name, "Basic");
        assert_eq!(plan.data_allowance, 10240);
        assert!(plan.is_active());
    }

    #[test]
    fn create_respects_explicit_status() {
        let plan = PhonePlan::create(&ChangePlan::new("u1").status(PlanStatus::Suspended));
        assert_eq!(plan.status, PlanStatus::Suspended);
        assert_eq!(plan.plan_name, "");
        assert_eq!(plan.data_allowance, 0);
    }

    #[test]
    fn merge_overwrites_only_provided_fields() {
        let mut plan = PhonePlan::create(&ChangePlan::full("u1", "Basic", 10240, 200, 100, 45000.0));
        plan.merge(&ChangePlan::new("u1").plan_name("Premium").monthly_fee(85000.0));

        assert_eq!(plan.plan_name, "Premium");
        assert_eq!(plan.monthly_fee, 85000.0);
        assert_eq!(plan.data_allowance, 10240);
        assert_eq!(plan.call_minutes, 200);
        assert_eq!(plan.message_count, 100);
    }

    #[test]
    fn merge_keeps_existing_status_when_absent() {
        let mut plan = PhonePlan::create(&ChangePlan::new("u1").status(PlanStatus::Suspended));
        plan.merge(&ChangePlan::new("u1").data_allowance(1));
        assert_eq!(plan.status, PlanStatus::Suspended);

        plan.merge(&ChangePlan::new("u1").status(PlanStatus::Active));
        assert_eq!(plan.status, PlanStatus::Active);
    }
}
