//! Read-only access to the projection.

use common::UserId;

use crate::error::QueryError;
use crate::store::ViewStore;
use crate::view::PhonePlanView;

/// Serves views straight from the store, with no coordination with the
/// event pipeline. A view may lag behind the write side.
#[derive(Clone)]
pub struct PlanQueryService<S> {
    store: S,
}

impl<S: ViewStore> PlanQueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the current view for a user.
    #[tracing::instrument(skip(self))]
    pub async fn get_view(&self, user_id: &UserId) -> Result<PhonePlanView, QueryError> {
        self.store
            .get(user_id)
            .await?
            .ok_or_else(|| QueryError::NotFound(user_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use domain::{ChangePlan, PhonePlan, PlanEvent};

    use super::*;
    use crate::projector::PlanProjector;
    use crate::store::InMemoryViewStore;

    #[tokio::test]
    async fn missing_view_is_not_found() {
        let service = PlanQueryService::new(InMemoryViewStore::new());

        let err = service.get_view(&UserId::new("u1")).await.unwrap_err();

        assert!(matches!(err, QueryError::NotFound(user) if user == UserId::new("u1")));
    }

    #[tokio::test]
    async fn returns_projected_view() {
        let store = InMemoryViewStore::new();
        let event = PlanEvent::plan_changed(&PhonePlan::create(&ChangePlan::full(
            "u1", "Basic", 10240, 200, 100, 45000.0,
        )));
        PlanProjector::new(store.clone()).apply(&event).await.unwrap();

        let view = PlanQueryService::new(store)
            .get_view(&UserId::new("u1"))
            .await
            .unwrap();

        assert_eq!(view.plan_name, "Basic");
        assert_eq!(view.monthly_fee, 45000.0);
    }
}
