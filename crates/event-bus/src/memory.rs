use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::topics::{PLAN_TOPIC, USAGE_TOPIC};
use tokio::sync::{RwLock, watch};

use crate::{
    BusMessage, EventBusError, Offset, PartitionId, PublishAck, Result,
    bus::{EventBus, MessageStream},
    partition::partition_for,
};

/// Default message size bound, matching common broker batch limits.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

struct PartitionLog {
    messages: RwLock<Vec<BusMessage>>,
    /// Number of messages in the log; bumped on every append to wake readers.
    high_watermark: watch::Sender<u64>,
}

impl PartitionLog {
    fn new() -> Self {
        let (high_watermark, _) = watch::channel(0);
        Self {
            messages: RwLock::new(Vec::new()),
            high_watermark,
        }
    }
}

/// In-memory partitioned event bus.
///
/// Each topic is a fixed set of append-only partition logs. Messages are
/// never removed, so any subscriber can replay a partition from any offset.
/// Clones share the same logs.
#[derive(Clone)]
pub struct InMemoryEventBus {
    topics: Arc<HashMap<String, Vec<Arc<PartitionLog>>>>,
    max_payload_bytes: usize,
    available: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Creates a bus with the given topics, each split into `partition_count` partitions.
    pub fn new<I, T>(topics: I, partition_count: u32) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let count = partition_count.max(1);
        let topics = topics
            .into_iter()
            .map(|topic| {
                let partitions = (0..count).map(|_| Arc::new(PartitionLog::new())).collect();
                (topic.into(), partitions)
            })
            .collect();

        Self {
            topics: Arc::new(topics),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Creates a bus carrying the plan and usage topics.
    pub fn with_default_topics(partition_count: u32) -> Self {
        Self::new([PLAN_TOPIC, USAGE_TOPIC], partition_count)
    }

    /// Sets the maximum accepted payload size in bytes.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// Simulates the transport going away or coming back.
    ///
    /// While unavailable, every publish fails with `TransportUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns a copy of every message currently stored on a partition.
    pub async fn messages(&self, topic: &str, partition: PartitionId) -> Result<Vec<BusMessage>> {
        let log = self.partition_log(topic, partition)?;
        Ok(log.messages.read().await.clone())
    }

    /// Returns the total number of messages published on a topic.
    pub async fn message_count(&self, topic: &str) -> Result<usize> {
        let partitions = self
            .topics
            .get(topic)
            .ok_or_else(|| EventBusError::UnknownTopic(topic.to_string()))?;
        let mut total = 0;
        for log in partitions {
            total += log.messages.read().await.len();
        }
        Ok(total)
    }

    /// Appends a raw message to a specific partition, bypassing key routing.
    ///
    /// Lets callers inject payloads a well-behaved publisher would never
    /// produce, such as undecodable bodies.
    pub async fn inject(
        &self,
        topic: &str,
        partition: PartitionId,
        partition_key: &str,
        payload: String,
        event_type: &str,
    ) -> Result<PublishAck> {
        let log = self.partition_log(topic, partition)?;
        Ok(Self::append(&log, topic, partition, partition_key, payload, event_type).await)
    }

    fn partition_log(&self, topic: &str, partition: PartitionId) -> Result<Arc<PartitionLog>> {
        let partitions = self
            .topics
            .get(topic)
            .ok_or_else(|| EventBusError::UnknownTopic(topic.to_string()))?;
        partitions
            .get(partition.as_index())
            .cloned()
            .ok_or_else(|| EventBusError::UnknownPartition {
                topic: topic.to_string(),
                partition,
            })
    }

    async fn append(
        log: &PartitionLog,
        topic: &str,
        partition: PartitionId,
        partition_key: &str,
        payload: String,
        event_type: &str,
    ) -> PublishAck {
        let mut messages = log.messages.write().await;
        let offset = Offset::new(messages.len() as u64);
        messages.push(BusMessage {
            topic: topic.to_string(),
            partition,
            offset,
            partition_key: partition_key.to_string(),
            event_type: event_type.to_string(),
            payload,
            enqueued_at: Utc::now(),
        });
        log.high_watermark.send_replace(messages.len() as u64);

        PublishAck {
            topic: topic.to_string(),
            partition,
            offset,
        }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: String,
        event_type: &str,
    ) -> Result<PublishAck> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(EventBusError::TransportUnavailable(format!(
                "in-memory bus is offline, topic {topic}"
            )));
        }

        let size = payload.len();
        if size > self.max_payload_bytes {
            return Err(EventBusError::PayloadTooLarge {
                size,
                max: self.max_payload_bytes,
            });
        }

        let partition = partition_for(partition_key, self.partition_count(topic)?);
        let log = self.partition_log(topic, partition)?;
        let ack = Self::append(&log, topic, partition, partition_key, payload, event_type).await;

        metrics::counter!("event_bus_messages_published", "topic" => topic.to_string())
            .increment(1);
        tracing::debug!(
            topic,
            partition = %ack.partition,
            offset = %ack.offset,
            event_type,
            "message published"
        );

        Ok(ack)
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
        partition: PartitionId,
        from: Option<Offset>,
    ) -> Result<MessageStream> {
        use futures_util::stream;

        let log = self.partition_log(topic, partition)?;
        let watermark = log.high_watermark.subscribe();
        let start = from.unwrap_or_default();

        tracing::debug!(topic, consumer_group, %partition, from = %start, "subscribed");

        let stream = stream::unfold(
            (log, watermark, start),
            |(log, mut watermark, next)| async move {
                loop {
                    let message = log
                        .messages
                        .read()
                        .await
                        .get(next.as_u64() as usize)
                        .cloned();
                    if let Some(message) = message {
                        return Some((Ok(message), (log, watermark, next.next())));
                    }
                    // Appends after the receiver was created always mark it changed,
                    // so a message published between the read and this await is not missed.
                    if watermark.changed().await.is_err() {
                        return None;
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    fn partition_count(&self, topic: &str) -> Result<u32> {
        self.topics
            .get(topic)
            .map(|partitions| partitions.len() as u32)
            .ok_or_else(|| EventBusError::UnknownTopic(topic.to_string()))
    }
}
