use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Offset, PartitionId, Result};

/// Identifies one checkpoint record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    pub topic: String,
    pub partition: PartitionId,
    pub consumer_group: String,
}

impl CheckpointKey {
    pub fn new(topic: &str, partition: PartitionId, consumer_group: &str) -> Self {
        Self {
            topic: topic.to_string(),
            partition,
            consumer_group: consumer_group.to_string(),
        }
    }
}

/// Durable record of consumer progress per (topic, partition, consumer group).
///
/// The stored offset is the last message that was fully handled; a consumer
/// resumes at the offset after it. Each record has a single writer at a time
/// (the owner of that partition), so no locking beyond a per-key upsert is needed.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint, or `None` if the partition was never checkpointed.
    async fn load(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
    ) -> Result<Option<Offset>>;

    /// Records `offset` as handled. A lower offset than the stored one is ignored.
    async fn store(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
        offset: Offset,
    ) -> Result<()>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn load(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
    ) -> Result<Option<Offset>> {
        (**self).load(topic, partition, consumer_group).await
    }

    async fn store(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
        offset: Offset,
    ) -> Result<()> {
        (**self)
            .store(topic, partition, consumer_group, offset)
            .await
    }
}

/// In-memory checkpoint store.
///
/// Survives processor restarts within one process, which is what tests and
/// single-node deployments need. Clones share the same records.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<CheckpointKey, Offset>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored checkpoint.
    pub async fn snapshot(&self) -> HashMap<CheckpointKey, Offset> {
        self.checkpoints.read().await.clone()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
    ) -> Result<Option<Offset>> {
        let key = CheckpointKey::new(topic, partition, consumer_group);
        Ok(self.checkpoints.read().await.get(&key).copied())
    }

    async fn store(
        &self,
        topic: &str,
        partition: PartitionId,
        consumer_group: &str,
        offset: Offset,
    ) -> Result<()> {
        let key = CheckpointKey::new(topic, partition, consumer_group);
        let mut checkpoints = self.checkpoints.write().await;
        let entry = checkpoints.entry(key).or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
        Ok(())
    }
}
