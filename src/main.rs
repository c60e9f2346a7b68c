//! Face Matching Worker
//!
//! Long-polls the request queue for face images, matches each one against the
//! reference embeddings and publishes the label to the object store and the
//! response queue.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use facematch_worker::config::Config;
use facematch_worker::engine::{EmbeddingStore, InferenceInvoker, Matcher, ProcessEmbedder};
use facematch_worker::queue::{JobQueue, SqliteQueueStore};
use facematch_worker::service::{ConsumerQueues, ConsumerSettings, JobConsumer, RetryLoop, RetryPolicy};
use facematch_worker::storage::ResultStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Face Matching Worker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_path = Config::default_path();
    let config = Config::load(&config_path)?;

    info!("Configuration loaded from {}:", config_path);
    info!("  Queue database: {}", config.queue.database_path.display());
    info!("  Max deliveries per job: {}", config.queue.max_receive_count);
    info!("  Output store: {}", config.storage.output_url);
    info!("  Scratch dir: {}", config.worker.scratch_dir.display());

    // Reference embeddings; a bad file stops startup
    let store = EmbeddingStore::load(&config.inference.embeddings_path)
        .with_context(|| "failed to load reference embeddings")?;
    let matcher = Matcher::new(
        Arc::new(store),
        config.inference.max_distance,
        config.inference.unknown_label.clone(),
    );
    let embedder = Arc::new(ProcessEmbedder::from_config(&config.inference));
    let invoker = InferenceInvoker::new(embedder, matcher);

    // Queues
    let db_path = config.queue.database_path.to_string_lossy();
    let queues = SqliteQueueStore::connect(&db_path).await?;
    info!("SQLite queue store initialized at: {}", db_path);

    let visibility = config.queue.visibility_timeout();
    let requests = queues.queue(&config.queue.request_queue, visibility);
    let responses = queues.queue(&config.queue.response_queue, visibility);
    let dead_letters = config
        .queue
        .dead_letter_queue
        .as_deref()
        .map(|name| queues.queue(name, visibility));

    info!("Consuming {} -> {}", requests.name(), responses.name());
    match &dead_letters {
        Some(queue) => info!("Dead letters go to {}", queue.name()),
        None => info!("No dead-letter queue; failed jobs stay on {}", requests.name()),
    }

    let consumer_queues = ConsumerQueues {
        requests: Arc::new(requests),
        responses: Arc::new(responses),
        dead_letters: dead_letters.map(|queue| Arc::new(queue) as Arc<dyn JobQueue>),
    };

    let results = ResultStore::from_url(&config.storage.output_url, &config.aws)?;

    tokio::fs::create_dir_all(&config.worker.scratch_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create scratch dir {}",
                config.worker.scratch_dir.display()
            )
        })?;

    let consumer = JobConsumer::new(
        consumer_queues,
        results,
        invoker,
        ConsumerSettings::from_config(&config),
    );
    let mut worker = RetryLoop::new(consumer, RetryPolicy::from_config(&config.worker));

    let shutdown = Arc::new(Notify::new());
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move {
        worker.run(shutdown_clone).await;
    });

    info!("Face Matching Worker is ready!");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, finishing current cycle...");
    shutdown.notify_one();
    handle.await?;

    info!("Goodbye!");
    Ok(())
}
