use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index of a partition within a topic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Creates a partition id from a raw index.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw partition index.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a message within one partition.
///
/// Offsets start at 0 and increase by 1 for every message appended to the
/// partition. A checkpoint records the offset of the last handled message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(u64);

impl Offset {
    /// Creates an offset from a raw value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The first offset of every partition.
    pub fn start() -> Self {
        Self(0)
    }

    /// Returns the offset immediately after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw offset value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,

    /// Partition the message was routed to.
    pub partition: PartitionId,

    /// Position of the message within its partition.
    pub offset: Offset,

    /// Key used for partition routing.
    pub partition_key: String,

    /// Out-of-band event type tag, readable without parsing the payload.
    pub event_type: String,

    /// Serialized event body.
    pub payload: String,

    /// When the bus accepted the message.
    pub enqueued_at: DateTime<Utc>,
}

/// Acknowledgement returned once the bus has accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub topic: String,
    pub partition: PartitionId,
    pub offset: Offset,
}
