//! Message queue access
//!
//! The worker only needs three queue operations, captured by [`JobQueue`].
//! Backends: an in-process queue and a SQLite-backed queue that several
//! worker processes can share.

pub mod traits;
pub mod memory;
pub mod sqlite;

pub use traits::{JobQueue, QueueMessage};
pub use memory::MemoryQueue;
pub use sqlite::{SqliteQueue, SqliteQueueStore};
