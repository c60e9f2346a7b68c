//! Job pipeline: message types, staging, the consumer state machine and the
//! outer retry loop

pub mod consumer;
pub mod retry;
pub mod staging;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use consumer::{ConsumerQueues, ConsumerSettings, ConsumerState, JobConsumer, Outcome};
pub use retry::{LoopStats, RetryLoop, RetryPolicy};
pub use types::*;
