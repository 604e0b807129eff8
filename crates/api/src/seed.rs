//! Sample plans loaded on startup outside production.

use domain::{ChangePlan, PlanCommandService, PlanRepository};
use event_bus::EventBus;

/// (user id, plan name, data MB, call minutes, messages, monthly fee)
const SAMPLE_PLANS: [(&str, &str, i32, i32, i32, f64); 5] = [
    ("user1", "Basic 5G", 10240, 200, 100, 45000.0),
    ("user2", "Premium Unlimited", 999999, 999999, 999999, 85000.0),
    ("user3", "Student Special", 20480, 100, 50, 35000.0),
    ("user4", "Senior Care", 5120, 500, 200, 30000.0),
    ("user5", "Data Only", 30720, 0, 0, 40000.0),
];

/// Commands creating the sample plans.
pub fn sample_plans() -> Vec<ChangePlan> {
    SAMPLE_PLANS
        .iter()
        .map(|&(user, name, data, calls, messages, fee)| {
            ChangePlan::full(user, name, data, calls, messages, fee)
        })
        .collect()
}

/// Runs every sample plan through the command service. Failures are logged
/// and skipped. Returns how many plans were created.
pub async fn load_sample_data<R, B>(commands: &PlanCommandService<R, B>) -> usize
where
    R: PlanRepository,
    B: EventBus,
{
    tracing::info!("initializing sample phone plans");

    let mut created = 0;
    for cmd in sample_plans() {
        let name = cmd.plan_name.clone().unwrap_or_default();
        match commands.change_plan(cmd).await {
            Ok(plan) => {
                created += 1;
                tracing::info!(user_id = %plan.user_id, plan_name = %name, "created sample plan");
            }
            Err(error) => {
                tracing::error!(plan_name = %name, %error, "failed to create sample plan");
            }
        }
    }

    tracing::info!(created, "sample data initialization completed");
    created
}
