pub mod bus;
pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod message;
pub mod partition;
pub mod postgres;

pub use bus::{EventBus, MessageStream};
pub use checkpoint::{CheckpointKey, CheckpointStore, InMemoryCheckpointStore};
pub use error::{EventBusError, Result};
pub use memory::{DEFAULT_MAX_PAYLOAD_BYTES, InMemoryEventBus};
pub use message::{BusMessage, Offset, PartitionId, PublishAck};
pub use partition::partition_for;
pub use postgres::PostgresCheckpointStore;
