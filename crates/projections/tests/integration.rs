//! Integration tests: PlanCommandService → in-memory bus → EventProcessors → PlanQueryService.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::topics::{DEFAULT_CONSUMER_GROUP, PLAN_TOPIC, USAGE_TOPIC};
use common::{EventType, PlanStatus, UserId};
use domain::{
    ChangePlan, InMemoryPlanRepository, PlanChanged, PlanCommandService, PlanEvent, RecordUsage,
    UsageUpdated,
};
use event_bus::{
    CheckpointStore, EventBus, InMemoryCheckpointStore, InMemoryEventBus, Offset, partition_for,
};
use projections::{
    AtomicProcessorMetrics, EventProcessor, InMemoryViewStore, PartitionState, PhonePlanView,
    PlanQueryService, ProcessorConfig, ProcessorHandle, QueryError, RetryPolicy, ViewStore,
    ViewStoreError,
};

const PARTITIONS: u32 = 4;

/// Wires the write side, both processors, and the query side over shared in-memory stores.
struct Pipeline {
    commands: PlanCommandService<InMemoryPlanRepository, InMemoryEventBus>,
    queries: PlanQueryService<InMemoryViewStore>,
    bus: InMemoryEventBus,
    checkpoints: InMemoryCheckpointStore,
    views: InMemoryViewStore,
    metrics: Arc<AtomicProcessorMetrics>,
}

impl Pipeline {
    fn new() -> Self {
        let bus = InMemoryEventBus::with_default_topics(PARTITIONS);
        let views = InMemoryViewStore::new();
        Self {
            commands: PlanCommandService::new(InMemoryPlanRepository::new(), bus.clone()),
            queries: PlanQueryService::new(views.clone()),
            bus,
            checkpoints: InMemoryCheckpointStore::new(),
            views,
            metrics: Arc::new(AtomicProcessorMetrics::new()),
        }
    }

    fn config(event_type: EventType) -> ProcessorConfig {
        ProcessorConfig::for_event_type(event_type)
            .retry_policy(RetryPolicy::new(
                2,
                Duration::from_millis(1),
                Duration::from_millis(2),
            ))
            .stall_backoff(Duration::from_millis(20))
    }

    fn start<S: ViewStore + 'static>(&self, event_type: EventType, store: S) -> ProcessorHandle {
        EventProcessor::new(
            self.bus.clone(),
            self.checkpoints.clone(),
            store,
            Self::config(event_type),
        )
        .with_metrics(self.metrics.clone())
        .start()
        .unwrap()
    }

    fn start_both(&self) -> (ProcessorHandle, ProcessorHandle) {
        (
            self.start(EventType::PlanChanged, self.views.clone()),
            self.start(EventType::UsageUpdated, self.views.clone()),
        )
    }

    async fn checkpoint(&self, topic: &str, user: &str) -> Option<Offset> {
        self.checkpoints
            .load(topic, partition_for(user, PARTITIONS), DEFAULT_CONSUMER_GROUP)
            .await
            .unwrap()
    }

    async fn view(&self, user: &str) -> Option<PhonePlanView> {
        self.queries.get_view(&UserId::new(user)).await.ok()
    }
}

async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// Returns a user routed to a different partition than `other`.
fn user_on_other_partition(other: &str) -> String {
    (0..)
        .map(|i| format!("user{i}"))
        .find(|u| partition_for(u, PARTITIONS) != partition_for(other, PARTITIONS))
        .unwrap()
}

/// View store that records the plan name of every successful plan write.
#[derive(Clone, Default)]
struct RecordingStore {
    inner: InMemoryViewStore,
    applied: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ViewStore for RecordingStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<PhonePlanView>, ViewStoreError> {
        self.inner.get(user_id).await
    }

    async fn update_plan(&self, event: &PlanChanged) -> Result<(), ViewStoreError> {
        self.inner.update_plan(event).await?;
        self.applied.lock().unwrap().push(event.plan_name.clone());
        Ok(())
    }

    async fn update_usage(&self, event: &UsageUpdated) -> Result<bool, ViewStoreError> {
        self.inner.update_usage(event).await
    }
}

#[tokio::test]
async fn plan_change_reaches_the_query_side() {
    let p = &Pipeline::new();
    let (plans, usage) = p.start_both();

    p.commands
        .change_plan(ChangePlan::full("u1", "Basic", 10240, 200, 100, 45000.0))
        .await
        .unwrap();

    eventually(|| async move { p.view("u1").await.is_some() }).await;
    let view = p.view("u1").await.unwrap();
    assert_eq!(view.plan_name, "Basic");
    assert_eq!(view.data_allowance, 10240);
    assert_eq!(view.status, PlanStatus::Active);
    assert!(view.data_usage.is_none());
    assert!(view.call_usage.is_none());
    assert!(view.message_usage.is_none());

    plans.stop().await;
    usage.stop().await;
}

#[tokio::test]
async fn usage_merges_into_existing_view() {
    let p = &Pipeline::new();
    let (plans, usage) = p.start_both();

    p.commands
        .change_plan(ChangePlan::full("u1", "Basic", 10240, 200, 100, 45000.0))
        .await
        .unwrap();
    eventually(|| async move { p.view("u1").await.is_some() }).await;

    p.commands
        .record_usage(RecordUsage::new("u1").data_usage(35))
        .await
        .unwrap();

    eventually(|| async move {
        p.view("u1")
            .await
            .is_some_and(|v| v.data_usage == Some(35))
    })
    .await;
    let view = p.view("u1").await.unwrap();
    assert_eq!(view.data_allowance, 10240);
    assert!(view.call_usage.is_none());

    plans.stop().await;
    usage.stop().await;
}

#[tokio::test]
async fn plan_and_usage_processors_do_not_overwrite_each_other() {
    let p = &Pipeline::new();
    let (plans, usage) = p.start_both();

    p.commands
        .change_plan(ChangePlan::full("u1", "Basic", 10240, 200, 100, 45000.0))
        .await
        .unwrap();
    eventually(|| async move { p.view("u1").await.is_some() }).await;

    p.views.delay_writes(Duration::from_millis(50));
    p.commands
        .change_plan(ChangePlan::new("u1").plan_name("Premium"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    p.commands
        .record_usage(RecordUsage::new("u1").data_usage(35))
        .await
        .unwrap();

    eventually(|| async move {
        p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(1))
            && p.checkpoint(USAGE_TOPIC, "u1").await == Some(Offset::new(0))
    })
    .await;
    let view = p.view("u1").await.unwrap();
    assert_eq!(view.plan_name, "Premium");
    assert_eq!(view.data_usage, Some(35));

    plans.stop().await;
    usage.stop().await;
}

#[tokio::test]
async fn redelivered_plan_event_is_idempotent() {
    let p = &Pipeline::new();
    let event = PlanEvent::plan_changed(&domain::PhonePlan::create(&ChangePlan::full(
        "u1", "Basic", 10240, 200, 100, 45000.0,
    )));
    let payload = event.to_json().unwrap();
    let partition = partition_for("u1", PARTITIONS);

    p.bus
        .inject(PLAN_TOPIC, partition, "u1", payload.clone(), "PLAN_CHANGED")
        .await
        .unwrap();
    let plans = p.start(EventType::PlanChanged, p.views.clone());
    eventually(|| async move { p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(0)) })
        .await;
    let once = p.view("u1").await.unwrap();

    p.bus
        .inject(PLAN_TOPIC, partition, "u1", payload, "PLAN_CHANGED")
        .await
        .unwrap();
    eventually(|| async move { p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(1)) })
        .await;
    let twice = p.view("u1").await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(p.views.count().await, 1);

    plans.stop().await;
}

#[tokio::test]
async fn usage_for_unknown_user_fails_without_publishing() {
    let p = Pipeline::new();

    let err = p
        .commands
        .record_usage(RecordUsage::new("ghost").data_usage(1))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(p.bus.message_count(USAGE_TOPIC).await.unwrap(), 0);
}

#[tokio::test]
async fn same_key_events_apply_in_publication_order() {
    let p = &Pipeline::new();
    let store = RecordingStore::default();
    let plans = p.start(EventType::PlanChanged, store.clone());

    let names: Vec<String> = (0..20).map(|i| format!("plan-{i}")).collect();
    for name in &names {
        p.commands
            .change_plan(ChangePlan::new("u1").plan_name(name.clone()))
            .await
            .unwrap();
    }

    eventually(|| async move { p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(19)) })
        .await;
    assert_eq!(*store.applied.lock().unwrap(), names);

    plans.stop().await;
}

#[tokio::test]
async fn failing_partition_does_not_block_others() {
    let p = &Pipeline::new();
    let blocked = "userA";
    let healthy = user_on_other_partition(blocked);
    let healthy = healthy.as_str();
    p.views.block_user(blocked).await;
    let plans = p.start(EventType::PlanChanged, p.views.clone());

    p.commands
        .change_plan(ChangePlan::full(blocked, "Basic", 1, 1, 1, 1.0))
        .await
        .unwrap();
    p.commands
        .change_plan(ChangePlan::full(healthy, "Basic", 1, 1, 1, 1.0))
        .await
        .unwrap();

    eventually(|| async move { p.view(healthy).await.is_some() }).await;
    let blocked_partition = partition_for(blocked, PARTITIONS).as_u32() as usize;
    let plans_ref = &plans;
    eventually(|| async move {
        matches!(
            plans_ref.partition_states()[blocked_partition],
            PartitionState::Stalled | PartitionState::Retrying | PartitionState::Applying
        ) && p.metrics.snapshot().plan_event_errors >= 1
    })
    .await;
    assert!(p.view(blocked).await.is_none());
    assert_eq!(p.checkpoint(PLAN_TOPIC, blocked).await, None);

    p.views.unblock_user(blocked).await;
    eventually(|| async move { p.view(blocked).await.is_some() }).await;

    plans.stop().await;
}

#[tokio::test]
async fn restart_resumes_from_checkpoint() {
    let p = &Pipeline::new();

    let plans = p.start(EventType::PlanChanged, p.views.clone());
    for name in ["first", "second"] {
        p.commands
            .change_plan(ChangePlan::new("u1").plan_name(name))
            .await
            .unwrap();
    }
    eventually(|| async move { p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(1)) })
        .await;
    plans.stop().await;
    assert_eq!(p.metrics.snapshot().plan_events_processed, 2);

    p.commands
        .change_plan(ChangePlan::new("u1").plan_name("third"))
        .await
        .unwrap();

    let plans = p.start(EventType::PlanChanged, p.views.clone());
    eventually(|| async move { p.checkpoint(PLAN_TOPIC, "u1").await == Some(Offset::new(2)) })
        .await;

    assert_eq!(p.metrics.snapshot().plan_events_processed, 3);
    assert_eq!(p.view("u1").await.unwrap().plan_name, "third");

    plans.stop().await;
}

#[tokio::test]
async fn unknown_user_usage_is_skipped_and_checkpointed() {
    let p = &Pipeline::new();
    let usage = p.start(EventType::UsageUpdated, p.views.clone());
    let event = PlanEvent::usage_updated(&RecordUsage::new("ghost").call_usage(5));

    p.bus
        .publish(
            event.topic(),
            "ghost",
            event.to_json().unwrap(),
            event.event_type().as_str(),
        )
        .await
        .unwrap();

    eventually(|| async move { p.checkpoint(USAGE_TOPIC, "ghost").await == Some(Offset::new(0)) })
        .await;
    assert_eq!(p.views.count().await, 0);
    assert!(matches!(
        p.queries.get_view(&UserId::new("ghost")).await,
        Err(QueryError::NotFound(_))
    ));
    assert_eq!(p.metrics.snapshot().events_skipped, 1);

    usage.stop().await;
}

#[tokio::test]
async fn stopped_processor_leaves_new_events_unconsumed() {
    let p = &Pipeline::new();
    let plans = p.start(EventType::PlanChanged, p.views.clone());
    plans.stop().await;

    p.commands
        .change_plan(ChangePlan::full("u1", "Basic", 1, 1, 1, 1.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(p.view("u1").await.is_none());
    assert_eq!(p.checkpoint(PLAN_TOPIC, "u1").await, None);
}
