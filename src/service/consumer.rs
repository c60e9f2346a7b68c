//! Job consumer - one job per cycle
//!
//! A cycle walks `Polling -> Staging -> Inferring -> Publishing ->
//! Acknowledging -> CleaningUp -> Idle`. Any failure moves to
//! `ErrorRecovery`: the job is either routed to the dead-letter queue or left
//! un-acknowledged for redelivery, and the error is handed to the caller.
//! The staged file is released on every path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::staging::StagedFile;
use super::types::{DeadLetter, Job, ResultPayload};
use crate::config::Config;
use crate::engine::InferenceInvoker;
use crate::error::{JobError, PublishError};
use crate::queue::{JobQueue, QueueMessage};
use crate::storage::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Polling,
    Staging,
    Inferring,
    Publishing,
    Acknowledging,
    CleaningUp,
    ErrorRecovery,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Idle => "idle",
            ConsumerState::Polling => "polling",
            ConsumerState::Staging => "staging",
            ConsumerState::Inferring => "inferring",
            ConsumerState::Publishing => "publishing",
            ConsumerState::Acknowledging => "acknowledging",
            ConsumerState::CleaningUp => "cleaning_up",
            ConsumerState::ErrorRecovery => "error_recovery",
        }
    }
}

/// What a successful cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The poll returned no job
    Idle,
    /// Result published and job acknowledged
    Completed(ResultPayload),
    /// Job moved to the dead-letter queue and removed from the request queue
    DeadLettered { message_id: String, reason: String },
}

/// Queues the consumer talks to
#[derive(Clone)]
pub struct ConsumerQueues {
    pub requests: Arc<dyn JobQueue>,
    pub responses: Arc<dyn JobQueue>,
    pub dead_letters: Option<Arc<dyn JobQueue>>,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub wait_time: Duration,
    pub max_receive_count: u32,
    pub scratch_dir: PathBuf,
}

impl ConsumerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wait_time: config.queue.wait_time(),
            max_receive_count: config.queue.max_receive_count,
            scratch_dir: config.worker.scratch_dir.clone(),
        }
    }
}

pub struct JobConsumer {
    queues: ConsumerQueues,
    results: ResultStore,
    invoker: InferenceInvoker,
    settings: ConsumerSettings,
    state: ConsumerState,
}

impl JobConsumer {
    pub fn new(
        queues: ConsumerQueues,
        results: ResultStore,
        invoker: InferenceInvoker,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            queues,
            results,
            invoker,
            settings,
            state: ConsumerState::Idle,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!("consumer {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    /// Run one poll-and-process cycle
    pub async fn process_next(&mut self) -> Result<Outcome, JobError> {
        self.transition(ConsumerState::Polling);

        let message = match self.queues.requests.receive(self.settings.wait_time).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.transition(ConsumerState::Idle);
                return Ok(Outcome::Idle);
            }
            Err(err) => {
                self.transition(ConsumerState::ErrorRecovery);
                return Err(JobError::Poll(err));
            }
        };

        debug!(
            "Received message {} (delivery {})",
            message.message_id, message.receive_count
        );

        match self.handle(&message).await {
            Ok(payload) => {
                self.transition(ConsumerState::Idle);
                Ok(Outcome::Completed(payload))
            }
            Err(err) => {
                self.transition(ConsumerState::ErrorRecovery);
                self.recover(&message, err).await
            }
        }
    }

    async fn handle(&mut self, message: &QueueMessage) -> Result<ResultPayload, JobError> {
        let start = Instant::now();

        self.transition(ConsumerState::Staging);
        let job = Job::parse(&message.body)?;
        let result_key = job.result_key()?.to_string();
        let image = job.decode_image()?;
        let staged = StagedFile::create(&self.settings.scratch_dir, &job.file_name, &image)?;

        self.transition(ConsumerState::Inferring);
        let matched = self.invoker.infer(staged.path()).await?;
        let payload = ResultPayload {
            result_key,
            label: self.invoker.matcher().label_for(&matched).to_string(),
        };

        self.transition(ConsumerState::Publishing);
        self.publish(&payload).await?;

        self.transition(ConsumerState::Acknowledging);
        self.queues
            .requests
            .delete(&message.receipt_handle)
            .await
            .map_err(JobError::Acknowledge)?;

        self.transition(ConsumerState::CleaningUp);
        if let Err(e) = staged.close() {
            warn!("Failed to remove staged file for {}: {}", job.file_name, e);
        }

        info!(
            "Recognized {} as {} (distance {:.4}) in {}ms",
            job.file_name,
            payload.label,
            matched.distance,
            start.elapsed().as_millis()
        );
        Ok(payload)
    }

    /// Object store first, then the response queue; both before acknowledging
    async fn publish(&self, payload: &ResultPayload) -> Result<(), PublishError> {
        self.results
            .put_label(&payload.result_key, &payload.label)
            .await
            .map_err(|source| PublishError::Store {
                key: payload.result_key.clone(),
                source,
            })?;

        let body = serde_json::to_string(&payload.response_message())?;
        self.queues
            .responses
            .send(&body)
            .await
            .map_err(PublishError::Queue)?;

        debug!("Published result {} -> {}", payload.result_key, payload.label);
        Ok(())
    }

    async fn recover(&mut self, message: &QueueMessage, err: JobError) -> Result<Outcome, JobError> {
        // Results are already out once acknowledging starts; never dead-letter those
        if matches!(err, JobError::Acknowledge(_)) {
            return Err(err);
        }

        let exhausted = message.receive_count >= self.settings.max_receive_count;
        if !err.is_permanent() && !exhausted {
            return Err(err);
        }

        let Some(dead_letters) = self.queues.dead_letters.clone() else {
            if exhausted {
                warn!(
                    "Message {} has failed {} deliveries and no dead-letter queue is configured",
                    message.message_id, message.receive_count
                );
            }
            return Err(err);
        };

        let reason = err.to_string();
        let letter = DeadLetter {
            message_id: message.message_id.clone(),
            body: message.body.clone(),
            error: reason.clone(),
            receive_count: message.receive_count,
        };
        let body = serde_json::to_string(&letter)
            .map_err(|e| JobError::DeadLetter(PublishError::Encode(e)))?;
        dead_letters
            .send(&body)
            .await
            .map_err(|e| JobError::DeadLetter(PublishError::Queue(e)))?;
        if let Err(err) = self.queues.requests.delete(&message.receipt_handle).await {
            warn!(
                "Message {} was dead-lettered but is still queued; a redelivery dead-letters it again",
                message.message_id
            );
            return Err(JobError::Acknowledge(err));
        }

        warn!(
            "Dead-lettered message {} after {} deliveries: {}",
            message.message_id, message.receive_count, reason
        );
        self.transition(ConsumerState::Idle);
        Ok(Outcome::DeadLettered {
            message_id: message.message_id.clone(),
            reason,
        })
    }
}
