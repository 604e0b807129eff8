//! Idempotent application of plan events to the view store.

use domain::{PlanChanged, PlanEvent, UsageUpdated};

use crate::error::ViewStoreError;
use crate::store::ViewStore;

/// What applying one event did to the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The view was created or updated.
    Applied,
    /// Usage arrived for a user with no view yet; nothing was written.
    SkippedUnknownUser,
}

/// Applies events to a view store.
///
/// Every event carries absolute values, so applying the same event any
/// number of times leaves the store in the same state as applying it once.
#[derive(Clone)]
pub struct PlanProjector<S> {
    store: S,
}

impl<S: ViewStore> PlanProjector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies a single event.
    pub async fn apply(&self, event: &PlanEvent) -> Result<ApplyOutcome, ViewStoreError> {
        match event {
            PlanEvent::PlanChanged(e) => self.apply_plan_changed(e).await,
            PlanEvent::UsageUpdated(e) => self.apply_usage_updated(e).await,
        }
    }

    async fn apply_plan_changed(&self, event: &PlanChanged) -> Result<ApplyOutcome, ViewStoreError> {
        self.store.update_plan(event).await?;

        tracing::debug!(user_id = %event.user_id, plan_name = %event.plan_name, "plan view updated");
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_usage_updated(
        &self,
        event: &UsageUpdated,
    ) -> Result<ApplyOutcome, ViewStoreError> {
        if !self.store.update_usage(event).await? {
            // The plan event for this user has not been applied yet.
            tracing::warn!(user_id = %event.user_id, "usage for unknown user skipped");
            return Ok(ApplyOutcome::SkippedUnknownUser);
        }

        tracing::debug!(user_id = %event.user_id, "usage view updated");
        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::UserId;
    use domain::{ChangePlan, PhonePlan, RecordUsage};

    use super::*;
    use crate::store::InMemoryViewStore;

    fn projector() -> (PlanProjector<InMemoryViewStore>, InMemoryViewStore) {
        let store = InMemoryViewStore::new();
        (PlanProjector::new(store.clone()), store)
    }

    fn plan_changed(user: &str, name: &str, data: i32) -> PlanEvent {
        PlanEvent::plan_changed(&PhonePlan::create(&ChangePlan::full(
            user, name, data, 200, 100, 45000.0,
        )))
    }

    #[tokio::test]
    async fn plan_changed_creates_view() {
        let (projector, store) = projector();

        let outcome = projector
            .apply(&plan_changed("u1", "Basic", 10240))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Applied);
        let view = store.get(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(view.plan_name, "Basic");
        assert_eq!(view.data_allowance, 10240);
        assert!(view.data_usage.is_none());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_idempotent() {
        let (projector, store) = projector();
        let event = plan_changed("u1", "Basic", 10240);
        let usage = PlanEvent::usage_updated(&RecordUsage::new("u1").data_usage(35));

        projector.apply(&event).await.unwrap();
        projector.apply(&usage).await.unwrap();
        let once = store.get(&UserId::new("u1")).await.unwrap();

        projector.apply(&event).await.unwrap();
        projector.apply(&usage).await.unwrap();
        let twice = store.get(&UserId::new("u1")).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn usage_for_unknown_user_is_skipped_without_record() {
        let (projector, store) = projector();

        let outcome = projector
            .apply(&PlanEvent::usage_updated(
                &RecordUsage::new("ghost").data_usage(1),
            ))
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::SkippedUnknownUser);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn later_snapshot_wins() {
        let (projector, store) = projector();

        projector
            .apply(&plan_changed("u1", "Basic", 10240))
            .await
            .unwrap();
        projector
            .apply(&plan_changed("u1", "Premium", 20480))
            .await
            .unwrap();

        let view = store.get(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(view.plan_name, "Premium");
        assert_eq!(view.data_allowance, 20480);
    }

    #[tokio::test]
    async fn usage_landing_during_slow_plan_write_is_kept() {
        let (projector, store) = projector();
        projector
            .apply(&plan_changed("u1", "Basic", 10240))
            .await
            .unwrap();
        store.delay_writes(Duration::from_millis(50));

        let premium = plan_changed("u1", "Premium", 20480);
        let plan = projector.apply(&premium);
        let usage = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            projector
                .apply(&PlanEvent::usage_updated(
                    &RecordUsage::new("u1").data_usage(35),
                ))
                .await
        };
        let (plan, usage) = tokio::join!(plan, usage);
        assert_eq!(plan.unwrap(), ApplyOutcome::Applied);
        assert_eq!(usage.unwrap(), ApplyOutcome::Applied);

        let view = store.get(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(view.plan_name, "Premium");
        assert_eq!(view.data_usage, Some(35));
    }

    #[tokio::test]
    async fn store_failure_is_returned() {
        let (projector, store) = projector();
        store.fail_next_writes(1);

        let err = projector
            .apply(&plan_changed("u1", "Basic", 1))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.count().await, 0);
    }
}
