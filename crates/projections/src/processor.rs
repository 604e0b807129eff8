//! Per-topic event processor feeding the plan projection.
//!
//! Each partition of the topic is consumed by its own task, so events of one
//! partition are applied strictly in order while partitions progress
//! independently. A message is checkpointed only after it was applied or
//! deliberately skipped; a failure that survives every retry stalls its
//! partition until a later resubscription redelivers the message.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use common::topics::{DEFAULT_CONSUMER_GROUP, topic_for};
use common::{EventType, UnknownEventType};
use domain::PlanEvent;
use event_bus::{BusMessage, CheckpointStore, EventBus, Offset, PartitionId};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ProjectionError, Result, ViewStoreError};
use crate::projector::{ApplyOutcome, PlanProjector};
use crate::retry::RetryPolicy;
use crate::sink::{ProcessorMetrics, PrometheusProcessorMetrics, SkipReason};
use crate::store::ViewStore;

/// Wait between a stall and the next subscription attempt, unless configured.
pub const DEFAULT_STALL_BACKOFF: Duration = Duration::from_secs(5);

/// Lifecycle of one partition consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PartitionState {
    /// Not started yet.
    Idle = 0,
    /// Resuming from the checkpoint or waiting for the next message.
    Subscribing = 1,
    /// Decoding a received message.
    Processing = 2,
    /// Writing the event to the projection.
    Applying = 3,
    /// Backing off after a transient store failure.
    Retrying = 4,
    /// Gave up on a message; waiting to resubscribe from the checkpoint.
    Stalled = 5,
    /// Shut down; no further messages are pulled.
    Stopped = 6,
}

impl PartitionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PartitionState::Idle,
            1 => PartitionState::Subscribing,
            2 => PartitionState::Processing,
            3 => PartitionState::Applying,
            4 => PartitionState::Retrying,
            5 => PartitionState::Stalled,
            _ => PartitionState::Stopped,
        }
    }
}

struct PartitionStates(Vec<AtomicU8>);

impl PartitionStates {
    fn new(count: u32) -> Self {
        Self(
            (0..count)
                .map(|_| AtomicU8::new(PartitionState::Idle as u8))
                .collect(),
        )
    }

    fn set(&self, partition: PartitionId, state: PartitionState) {
        if let Some(slot) = self.0.get(partition.as_u32() as usize) {
            slot.store(state as u8, Ordering::SeqCst);
        }
    }

    fn snapshot(&self) -> Vec<PartitionState> {
        self.0
            .iter()
            .map(|slot| PartitionState::from_u8(slot.load(Ordering::SeqCst)))
            .collect()
    }
}

/// A failure reported to the error callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingFailure {
    pub topic: String,
    pub partition: PartitionId,
    /// The message being handled, or `None` when resuming the partition failed.
    pub offset: Option<Offset>,
    pub error: String,
}

/// Callback invoked for every failure that stalls a partition.
pub type ErrorCallback = Arc<dyn Fn(&ProcessingFailure) + Send + Sync>;

/// What a processor consumes and how hard it retries.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub topic: String,
    pub consumer_group: String,
    /// Messages tagged with any other known type are skipped.
    pub event_type: EventType,
    pub retry: RetryPolicy,
    pub stall_backoff: Duration,
}

impl ProcessorConfig {
    /// Consumes the topic `event_type` is published on, in the default group.
    pub fn for_event_type(event_type: EventType) -> Self {
        Self {
            topic: topic_for(event_type).to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            event_type,
            retry: RetryPolicy::default(),
            stall_backoff: DEFAULT_STALL_BACKOFF,
        }
    }

    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = consumer_group.into();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stall_backoff(mut self, stall_backoff: Duration) -> Self {
        self.stall_backoff = stall_backoff;
        self
    }
}

/// Consumes one topic into the projection.
pub struct EventProcessor<B, C, S> {
    bus: B,
    checkpoints: C,
    projector: PlanProjector<S>,
    config: ProcessorConfig,
    metrics: Arc<dyn ProcessorMetrics>,
    on_error: Option<ErrorCallback>,
}

impl<B, C, S> EventProcessor<B, C, S>
where
    B: EventBus + 'static,
    C: CheckpointStore + 'static,
    S: ViewStore + 'static,
{
    /// Creates a processor reporting to the global metrics recorder.
    pub fn new(bus: B, checkpoints: C, store: S, config: ProcessorConfig) -> Self {
        Self {
            bus,
            checkpoints,
            projector: PlanProjector::new(store),
            config,
            metrics: Arc::new(PrometheusProcessorMetrics),
            on_error: None,
        }
    }

    /// Replaces the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn ProcessorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Registers a callback for failures that stall a partition.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProcessingFailure) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Spawns one consuming task per partition of the topic.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<ProcessorHandle> {
        let topic = self.config.topic.clone();
        let partition_count = self.bus.partition_count(&topic)?;
        let states = Arc::new(PartitionStates::new(partition_count));
        let (shutdown, shutdown_rx) = watch::channel(false);

        tracing::info!(
            topic = %topic,
            consumer_group = %self.config.consumer_group,
            event_type = %self.config.event_type,
            partitions = partition_count,
            "starting event processor"
        );

        let processor = Arc::new(self);
        let tasks = (0..partition_count)
            .map(|p| {
                let processor = Arc::clone(&processor);
                let states = Arc::clone(&states);
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    processor
                        .run_partition(PartitionId::new(p), &states, shutdown)
                        .await
                })
            })
            .collect();

        Ok(ProcessorHandle {
            topic,
            shutdown,
            tasks,
            states,
        })
    }

    async fn run_partition(
        &self,
        partition: PartitionId,
        states: &PartitionStates,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let topic = self.config.topic.as_str();

        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.consume(partition, states, &mut shutdown).await {
                Ok(()) => break,
                Err(error) => {
                    states.set(partition, PartitionState::Stalled);
                    tracing::error!(
                        topic,
                        %partition,
                        %error,
                        backoff_ms = self.config.stall_backoff.as_millis() as u64,
                        "partition stalled"
                    );
                    tokio::select! {
                        _ = stop_requested(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.config.stall_backoff) => {}
                    }
                }
            }
        }

        states.set(partition, PartitionState::Stopped);
        tracing::debug!(topic, %partition, "partition stopped");
    }

    /// Resumes from the checkpoint and handles messages until shutdown or failure.
    async fn consume(
        &self,
        partition: PartitionId,
        states: &PartitionStates,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let topic = self.config.topic.as_str();
        let group = self.config.consumer_group.as_str();

        states.set(partition, PartitionState::Subscribing);
        let from = self
            .checkpoints
            .load(topic, partition, group)
            .await
            .map_err(ProjectionError::from)
            .inspect_err(|e| self.report(partition, None, e))?
            .map(|checkpoint| checkpoint.next());
        let mut stream = self
            .bus
            .subscribe(topic, group, partition, from)
            .await
            .map_err(ProjectionError::from)
            .inspect_err(|e| self.report(partition, None, e))?;

        tracing::debug!(topic, %partition, from = ?from, "partition subscribed");

        loop {
            states.set(partition, PartitionState::Subscribing);
            let next = tokio::select! {
                biased;
                _ = stop_requested(shutdown) => return Ok(()),
                next = stream.next() => next,
            };
            let Some(message) = next else {
                return Ok(());
            };
            let message = message
                .map_err(ProjectionError::from)
                .inspect_err(|e| self.report(partition, None, e))?;

            states.set(partition, PartitionState::Processing);
            self.handle(&message, states)
                .await
                .inspect_err(|e| self.report(partition, Some(message.offset), e))?;
        }
    }

    #[tracing::instrument(
        skip(self, message, states),
        fields(topic = %message.topic, partition = %message.partition, offset = %message.offset)
    )]
    async fn handle(&self, message: &BusMessage, states: &PartitionStates) -> Result<()> {
        let topic = self.config.topic.as_str();

        let event = match self.decode(message) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(event_type = %message.event_type, "event for another processor skipped");
                self.metrics
                    .event_skipped(topic, SkipReason::ForeignEventType);
                return self.checkpoint(message).await;
            }
            Err(error) => {
                tracing::error!(%error, "malformed event skipped");
                self.metrics.event_skipped(topic, SkipReason::Malformed);
                return self.checkpoint(message).await;
            }
        };

        states.set(message.partition, PartitionState::Applying);
        let on_retry = |attempt: u32, error: &ViewStoreError, delay: Duration| {
            states.set(message.partition, PartitionState::Retrying);
            tracing::warn!(
                attempt,
                %error,
                delay_ms = delay.as_millis() as u64,
                "projection apply failed, retrying"
            );
        };

        match self
            .config
            .retry
            .run(|| self.projector.apply(&event), on_retry)
            .await
        {
            Ok(ApplyOutcome::Applied) => {
                self.metrics.event_processed(topic, event.event_type());
            }
            Ok(ApplyOutcome::SkippedUnknownUser) => {
                self.metrics.event_skipped(topic, SkipReason::UnknownUser);
            }
            Err(failure) => {
                self.metrics.event_failed(topic, event.event_type());
                return Err(ProjectionError::RetriesExhausted {
                    attempts: failure.attempts,
                    source: failure.error,
                });
            }
        }

        self.checkpoint(message).await
    }

    /// Returns `None` for a well-formed message tagged for another processor.
    fn decode(&self, message: &BusMessage) -> Result<Option<PlanEvent>> {
        let malformed = |reason: String| ProjectionError::MalformedEvent {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            reason,
        };

        let tag: EventType = message
            .event_type
            .parse()
            .map_err(|e: UnknownEventType| malformed(e.to_string()))?;
        if tag != self.config.event_type {
            return Ok(None);
        }

        let event = PlanEvent::from_json(&message.payload).map_err(|e| malformed(e.to_string()))?;
        if event.event_type() != tag {
            return Err(malformed(format!(
                "payload is {} but message is tagged {}",
                event.event_type(),
                tag
            )));
        }
        Ok(Some(event))
    }

    async fn checkpoint(&self, message: &BusMessage) -> Result<()> {
        self.checkpoints
            .store(
                &self.config.topic,
                message.partition,
                &self.config.consumer_group,
                message.offset,
            )
            .await?;
        Ok(())
    }

    fn report(&self, partition: PartitionId, offset: Option<Offset>, error: &ProjectionError) {
        if let Some(callback) = &self.on_error {
            callback(&ProcessingFailure {
                topic: self.config.topic.clone(),
                partition,
                offset,
                error: error.to_string(),
            });
        }
    }
}

async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Running processor. Dropping the handle without [`stop`](Self::stop)
/// leaves the partition tasks running.
pub struct ProcessorHandle {
    topic: String,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    states: Arc<PartitionStates>,
}

impl ProcessorHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Current state of every partition, indexed by partition id.
    pub fn partition_states(&self) -> Vec<PartitionState> {
        self.states.snapshot()
    }

    /// A read-only view of the partition states that outlives the handle.
    pub fn monitor(&self) -> ProcessorMonitor {
        ProcessorMonitor {
            topic: self.topic.clone(),
            states: Arc::clone(&self.states),
        }
    }

    /// Stops pulling new messages, lets in-flight work finish, and joins every task.
    pub async fn stop(self) {
        tracing::info!(topic = %self.topic, "stopping event processor");
        self.shutdown.send_replace(true);

        for task in self.tasks {
            if let Err(error) = task.await {
                tracing::error!(topic = %self.topic, %error, "partition task failed");
            }
        }

        tracing::info!(topic = %self.topic, "event processor stopped");
    }
}

/// Shareable probe of a processor's partition states.
#[derive(Clone)]
pub struct ProcessorMonitor {
    topic: String,
    states: Arc<PartitionStates>,
}

impl ProcessorMonitor {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_states(&self) -> Vec<PartitionState> {
        self.states.snapshot()
    }

    /// Partitions currently stalled on a message.
    pub fn stalled_partitions(&self) -> Vec<PartitionId> {
        self.partition_states()
            .into_iter()
            .enumerate()
            .filter(|(_, state)| *state == PartitionState::Stalled)
            .map(|(p, _)| PartitionId::new(p as u32))
            .collect()
    }
}
