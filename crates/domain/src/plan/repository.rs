//! Write-side storage for phone plans.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::UserId;
use tokio::sync::RwLock;

use super::PhonePlan;
use crate::error::RepositoryError;

/// Keyed storage for the plan aggregate.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Looks up the plan for a user.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<PhonePlan>, RepositoryError>;

    /// Inserts or replaces the plan keyed by its user id, returning the stored row.
    async fn upsert(&self, plan: &PhonePlan) -> Result<PhonePlan, RepositoryError>;
}

#[async_trait]
impl<T: PlanRepository + ?Sized> PlanRepository for Arc<T> {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<PhonePlan>, RepositoryError> {
        (**self).find_by_user_id(user_id).await
    }

    async fn upsert(&self, plan: &PhonePlan) -> Result<PhonePlan, RepositoryError> {
        (**self).upsert(plan).await
    }
}

/// In-memory plan repository for testing and local runs.
#[derive(Clone)]
pub struct InMemoryPlanRepository {
    plans: Arc<RwLock<HashMap<UserId, PhonePlan>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryPlanRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self {
            plans: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the number of stored plans.
    pub async fn count(&self) -> usize {
        self.plans.read().await.len()
    }

    /// Simulates the store going away; every call fails while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable(
                "in-memory repository is offline".to_string(),
            ))
        }
    }
}

impl Default for InMemoryPlanRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<PhonePlan>, RepositoryError> {
        self.check_available()?;
        Ok(self.plans.read().await.get(user_id).cloned())
    }

    async fn upsert(&self, plan: &PhonePlan) -> Result<PhonePlan, RepositoryError> {
        self.check_available()?;
        self.plans
            .write()
            .await
            .insert(plan.user_id.clone(), plan.clone());
        Ok(plan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ChangePlan;

    #[tokio::test]
    async fn upsert_then_find() {
        let repo = InMemoryPlanRepository::new();
        let plan = PhonePlan::create(&ChangePlan::full("u1", "Basic", 1, 2, 3, 4.0));

        repo.upsert(&plan).await.unwrap();

        let found = repo.find_by_user_id(&UserId::new("u1")).await.unwrap();
        assert_eq!(found, Some(plan));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let repo = InMemoryPlanRepository::new();
        let mut plan = PhonePlan::create(&ChangePlan::full("u1", "Basic", 1, 2, 3, 4.0));
        repo.upsert(&plan).await.unwrap();

        plan.plan_name = "Premium".to_string();
        repo.upsert(&plan).await.unwrap();

        assert_eq!(repo.count().await, 1);
        let found = repo.find_by_user_id(&UserId::new("u1")).await.unwrap().unwrap();
        assert_eq!(found.plan_name, "Premium");
    }

    #[tokio::test]
    async fn unavailable_repository_fails() {
        let repo = InMemoryPlanRepository::new();
        repo.set_available(false);

        let result = repo.find_by_user_id(&UserId::new("u1")).await;
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
    }
}
