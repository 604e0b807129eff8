use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{BusMessage, Offset, PartitionId, PublishAck, Result};

/// A lazy, unbounded stream of messages from one partition.
///
/// The stream suspends until the next message is available and only ends if
/// the bus itself goes away.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<BusMessage>> + Send>>;

/// Client side of a partitioned, at-least-once event bus.
///
/// Guarantees relied on by consumers:
/// - messages on one partition are delivered in publish order
/// - there is no ordering across partitions
/// - a message may be delivered more than once but is not silently dropped
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a payload on `topic`, routed by `partition_key`.
    ///
    /// Returns once the bus has accepted the message. Fails with
    /// `PayloadTooLarge` or `TransportUnavailable`; callers surface these and
    /// do not retry.
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: String,
        event_type: &str,
    ) -> Result<PublishAck>;

    /// Opens a stream over one partition of `topic`.
    ///
    /// Delivery starts at `from`, or at the beginning of the partition when
    /// `from` is `None`. Subscribing again from the same offset replays the
    /// same messages in the same order.
    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
        partition: PartitionId,
        from: Option<Offset>,
    ) -> Result<MessageStream>;

    /// Returns the number of partitions of `topic`.
    fn partition_count(&self, topic: &str) -> Result<u32>;
}

#[async_trait]
impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: String,
        event_type: &str,
    ) -> Result<PublishAck> {
        (**self)
            .publish(topic, partition_key, payload, event_type)
            .await
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer_group: &str,
        partition: PartitionId,
        from: Option<Offset>,
    ) -> Result<MessageStream> {
        (**self)
            .subscribe(topic, consumer_group, partition, from)
            .await
    }

    fn partition_count(&self, topic: &str) -> Result<u32> {
        (**self).partition_count(topic)
    }
}
