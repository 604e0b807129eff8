//! Partition-key routing.

use crate::PartitionId;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Maps a partition key onto one of `partition_count` partitions.
///
/// The mapping is a pure function of the key bytes (FNV-1a), so every publish
/// for one key lands on the same partition across processes and restarts.
pub fn partition_for(key: &str, partition_count: u32) -> PartitionId {
    let count = partition_count.max(1);
    let hash = key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    PartitionId::new((hash % u64::from(count)) as u32)
}
