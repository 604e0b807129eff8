//! Read-side storage for phone plan views.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use domain::{PlanChanged, UsageUpdated};
use tokio::sync::RwLock;

use crate::error::ViewStoreError;
use crate::view::PhonePlanView;

/// Keyed storage for projections.
///
/// The plan processor and the usage processor both write to a user's view, so
/// each update reads and writes the view as one step per user id.
#[async_trait]
pub trait ViewStore: Send + Sync {
    /// Looks up the view for a user.
    async fn get(&self, user_id: &UserId) -> Result<Option<PhonePlanView>, ViewStoreError>;

    /// Creates the view or overwrites its plan attributes. Usage is kept.
    async fn update_plan(&self, event: &PlanChanged) -> Result<(), ViewStoreError>;

    /// Overwrites the usage counters the event carries. Returns `false`
    /// without writing when the user has no view.
    async fn update_usage(&self, event: &UsageUpdated) -> Result<bool, ViewStoreError>;
}

#[async_trait]
impl<T: ViewStore + ?Sized> ViewStore for Arc<T> {
    async fn get(&self, user_id: &UserId) -> Result<Option<PhonePlanView>, ViewStoreError> {
        (**self).get(user_id).await
    }

    async fn update_plan(&self, event: &PlanChanged) -> Result<(), ViewStoreError> {
        (**self).update_plan(event).await
    }

    async fn update_usage(&self, event: &UsageUpdated) -> Result<bool, ViewStoreError> {
        (**self).update_usage(event).await
    }
}

/// In-memory view store.
///
/// Supports failure injection so callers can exercise retry and stall paths:
/// a number of upcoming writes can be made to fail transiently, writes for
/// specific users can be blocked until released, and every write can be
/// slowed down. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryViewStore {
    views: Arc<RwLock<HashMap<UserId, PhonePlanView>>>,
    failing_writes: Arc<AtomicU32>,
    blocked_users: Arc<RwLock<HashSet<UserId>>>,
    write_delay_ms: Arc<AtomicU64>,
}

impl InMemoryViewStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored views.
    pub async fn count(&self) -> usize {
        self.views.read().await.len()
    }

    /// Makes the next `count` writes fail with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Makes every write for `user_id` fail transiently until unblocked.
    pub async fn block_user(&self, user_id: impl Into<UserId>) {
        self.blocked_users.write().await.insert(user_id.into());
    }

    /// Lets writes for `user_id` through again.
    pub async fn unblock_user(&self, user_id: impl Into<UserId>) {
        self.blocked_users.write().await.remove(&user_id.into());
    }

    /// Holds every write for `delay` after it has read the current view.
    pub fn delay_writes(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn check_writable(&self, user_id: &UserId) -> Result<(), ViewStoreError> {
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(ViewStoreError::Unavailable("injected failure".to_string()));
        }
        if self.blocked_users.read().await.contains(user_id) {
            return Err(ViewStoreError::Unavailable(format!(
                "writes blocked for user {user_id}"
            )));
        }
        Ok(())
    }

    async fn write_delay(&self) {
        let ms = self.write_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl ViewStore for InMemoryViewStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<PhonePlanView>, ViewStoreError> {
        Ok(self.views.read().await.get(user_id).cloned())
    }

    async fn update_plan(&self, event: &PlanChanged) -> Result<(), ViewStoreError> {
        self.check_writable(&event.user_id).await?;

        let mut views = self.views.write().await;
        let updated = match views.get(&event.user_id) {
            Some(current) => {
                let mut view = current.clone();
                view.apply_plan_changed(event);
                view
            }
            None => PhonePlanView::from_plan_changed(event),
        };
        self.write_delay().await;
        views.insert(event.user_id.clone(), updated);
        Ok(())
    }

    async fn update_usage(&self, event: &UsageUpdated) -> Result<bool, ViewStoreError> {
        self.check_writable(&event.user_id).await?;

        let mut views = self.views.write().await;
        let Some(current) = views.get(&event.user_id) else {
            return Ok(false);
        };
        let mut view = current.clone();
        view.apply_usage(event);
        self.write_delay().await;
        views.insert(event.user_id.clone(), view);
        Ok(true)
    }
}
