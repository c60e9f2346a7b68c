//! Outer worker loop
//!
//! Drives [`JobConsumer`] until shutdown. Every error is logged and answered
//! with a pause; nothing a job does terminates the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info};

use super::consumer::{JobConsumer, Outcome};
use crate::config::WorkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause after a poll that returned nothing
    pub idle_pause: Duration,
    /// Pause after the first failure in a row
    pub error_pause: Duration,
    /// Ceiling for the doubled error pause
    pub max_error_pause: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            idle_pause: Duration::from_secs(config.idle_pause_secs),
            error_pause: Duration::from_secs(config.error_pause_secs),
            max_error_pause: Duration::from_secs(config.max_error_pause_secs),
        }
    }

    /// `error_pause * 2^(failures - 1)`, capped at `max_error_pause`
    pub fn pause_after_failures(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.error_pause
            .saturating_mul(factor)
            .min(self.max_error_pause)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub polls: u64,
    pub completed: u64,
    pub idle: u64,
    pub failed: u64,
    pub dead_lettered: u64,
}

pub struct RetryLoop {
    consumer: JobConsumer,
    policy: RetryPolicy,
    consecutive_failures: u32,
    stats: LoopStats,
}

impl RetryLoop {
    pub fn new(consumer: JobConsumer, policy: RetryPolicy) -> Self {
        Self {
            consumer,
            policy,
            consecutive_failures: 0,
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Run one consumer cycle and return how long to wait before the next
    pub async fn tick(&mut self) -> Duration {
        self.stats.polls += 1;

        match self.consumer.process_next().await {
            Ok(outcome) => {
                self.consecutive_failures = 0;
                match outcome {
                    Outcome::Idle => {
                        self.stats.idle += 1;
                        self.policy.idle_pause
                    }
                    Outcome::Completed(_) => {
                        self.stats.completed += 1;
                        Duration::ZERO
                    }
                    Outcome::DeadLettered { .. } => {
                        self.stats.dead_lettered += 1;
                        Duration::ZERO
                    }
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let pause = self.policy.pause_after_failures(self.consecutive_failures);
                error!(
                    "Job cycle failed ({} in a row), retrying in {}s: {}",
                    self.consecutive_failures,
                    pause.as_secs_f32(),
                    err
                );
                pause
            }
        }
    }

    /// Loop until `shutdown` is notified. A cycle in progress always finishes.
    pub async fn run(&mut self, shutdown: Arc<Notify>) {
        info!("Worker loop started");

        loop {
            let pause = self.tick().await;

            tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    info!("Worker loop shutting down");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        let stats = self.stats;
        info!(
            "Worker loop stopped: {} polls, {} completed, {} dead-lettered, {} failed",
            stats.polls, stats.completed, stats.dead_lettered, stats.failed
        );
    }
}
