//! Write coordinator: persists plans and publishes their events.

use common::UserId;
use event_bus::{EventBus, PublishAck};

use super::{ChangePlan, PhonePlan, PlanEvent, PlanRepository, RecordUsage, UsageAck};
use crate::error::DomainError;

/// Service handling plan changes and usage reports.
///
/// Every publish uses the user id as partition key, so all events of one user
/// on one topic are totally ordered. Plan and usage events travel on different
/// topics and have no relative order.
///
/// Persistence and publication are two separate steps with no transaction
/// spanning both. A crash or bus failure between them leaves the aggregate
/// stored without a matching event (reported as `PublishAfterCommit`).
pub struct PlanCommandService<R, B> {
    repository: R,
    bus: B,
}

impl<R: PlanRepository, B: EventBus> PlanCommandService<R, B> {
    /// Creates a new service over a repository and a bus client.
    pub fn new(repository: R, bus: B) -> Self {
        Self { repository, bus }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Creates or merges a plan, then publishes a PLAN_CHANGED snapshot.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn change_plan(&self, cmd: ChangePlan) -> Result<PhonePlan, DomainError> {
        validate_user_id(&cmd.user_id)?;

        let plan = match self.repository.find_by_user_id(&cmd.user_id).await? {
            Some(mut existing) => {
                existing.merge(&cmd);
                existing
            }
            None => PhonePlan::create(&cmd),
        };

        let saved = self.repository.upsert(&plan).await?;
        tracing::info!(plan_name = %saved.plan_name, status = %saved.status, "phone plan saved");

        let event = PlanEvent::plan_changed(&saved);
        self.publish(&event).await.map_err(|e| match e {
            DomainError::Publish(source) => {
                tracing::error!(error = %source, "plan saved but PLAN_CHANGED was not published");
                metrics::counter!("plan_publish_after_commit_failures_total").increment(1);
                DomainError::PublishAfterCommit {
                    user_id: saved.user_id.clone(),
                    source,
                }
            }
            other => other,
        })?;

        metrics::counter!("plan_changes_total").increment(1);
        Ok(saved)
    }

    /// Publishes a USAGE_UPDATED event for an existing plan.
    ///
    /// The aggregate itself is not touched: usage lives only on the read side.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn record_usage(&self, cmd: RecordUsage) -> Result<UsageAck, DomainError> {
        validate_user_id(&cmd.user_id)?;

        if self
            .repository
            .find_by_user_id(&cmd.user_id)
            .await?
            .is_none()
        {
            tracing::warn!("usage reported for unknown user");
            return Err(DomainError::PlanNotFound(cmd.user_id));
        }

        let event = PlanEvent::usage_updated(&cmd);
        self.publish(&event).await?;

        metrics::counter!("usage_updates_total").increment(1);
        Ok(UsageAck {
            success: true,
            message: "Usage update event published".to_string(),
            user_id: cmd.user_id,
            event_id: event.event_id(),
        })
    }

    /// Loads the write-side aggregate for a user.
    #[tracing::instrument(skip(self))]
    pub async fn get_plan(&self, user_id: &UserId) -> Result<Option<PhonePlan>, DomainError> {
        Ok(self.repository.find_by_user_id(user_id).await?)
    }

    async fn publish(&self, event: &PlanEvent) -> Result<PublishAck, DomainError> {
        let payload = event.to_json()?;
        let ack = self
            .bus
            .publish(
                event.topic(),
                event.user_id().as_str(),
                payload,
                event.event_type().as_str(),
            )
            .await?;

        tracing::info!(
            event_type = %event.event_type(),
            event_id = %event.event_id(),
            topic = %ack.topic,
            partition = %ack.partition,
            offset = %ack.offset,
            "event published"
        );
        Ok(ack)
    }
}

fn validate_user_id(user_id: &UserId) -> Result<(), DomainError> {
    if user_id.is_blank() {
        return Err(DomainError::Validation("userId must not be empty".to_string()));
    }
    Ok(())
}
