//! Fixtures shared by the pipeline tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::DynamicImage;
use object_store::local::LocalFileSystem;
use tempfile::TempDir;

use super::consumer::{ConsumerQueues, ConsumerSettings, JobConsumer};
use crate::engine::{EmbeddingRecord, EmbeddingStore, FaceEmbedder, InferenceInvoker, Matcher};
use crate::error::{InferenceError, QueueError};
use crate::queue::{JobQueue, MemoryQueue, QueueMessage};
use crate::storage::ResultStore;
use crate::utils::image::encode_png;

/// Returns a fixed probe per staged file name; unknown names crash
pub struct ScriptedEmbedder {
    probes: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceEmbedder for ScriptedEmbedder {
    async fn detect_and_embed(&self, image_path: &Path) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.probes
            .get(name)
            .cloned()
            .ok_or_else(|| InferenceError::ExternalProcess {
                exit_code: Some(1),
                output: format!("model crashed on {name}"),
            })
    }
}

/// Queue whose every operation fails
pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
    async fn receive(&self, _wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        Err(QueueError::Unavailable("connection refused".into()))
    }

    async fn send(&self, _body: &str) -> Result<(), QueueError> {
        Err(QueueError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        Err(QueueError::InvalidReceipt(receipt_handle.to_string()))
    }
}

/// Forwards to a [`MemoryQueue`] but fails the first `failing_deletes` deletes
pub struct FlakyDeleteQueue {
    inner: Arc<MemoryQueue>,
    failing_deletes: AtomicUsize,
}

impl FlakyDeleteQueue {
    pub fn new(inner: Arc<MemoryQueue>, failing_deletes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing_deletes: AtomicUsize::new(failing_deletes),
        })
    }
}

#[async_trait]
impl JobQueue for FlakyDeleteQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        self.inner.receive(wait).await
    }

    async fn send(&self, body: &str) -> Result<(), QueueError> {
        self.inner.send(body).await
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let fail = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(QueueError::Unavailable("delete timed out".into()));
        }
        self.inner.delete(receipt_handle).await
    }
}

/// Result store whose root directory has been replaced by a plain file
///
/// Every write fails; keep the returned `TempDir` alive for the test.
pub fn unwritable_results() -> (TempDir, ResultStore) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("output");
    std::fs::create_dir(&root).unwrap();
    let store = LocalFileSystem::new_with_prefix(&root).unwrap();
    std::fs::remove_dir(&root).unwrap();
    std::fs::write(&root, b"not a directory").unwrap();
    (dir, ResultStore::new(Arc::new(store)))
}

/// Store with `alice` near the origin and `bob` far away
pub struct Harness {
    pub requests: Arc<MemoryQueue>,
    pub responses: Arc<MemoryQueue>,
    pub results: ResultStore,
    pub embedder: Arc<ScriptedEmbedder>,
    pub store: Arc<EmbeddingStore>,
    pub scratch: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_visibility(Duration::from_secs(30))
    }

    pub fn with_visibility(visibility_timeout: Duration) -> Self {
        let store = EmbeddingStore::from_records(vec![
            EmbeddingRecord::new("alice", vec![0.0, 0.0]),
            EmbeddingRecord::new("bob", vec![10.0, 10.0]),
        ])
        .unwrap();

        let probes = HashMap::from([
            ("alice.jpg".to_string(), vec![0.5, 0.1]),
            ("bob.jpg".to_string(), vec![9.0, 9.5]),
        ]);

        Self {
            requests: Arc::new(MemoryQueue::new(visibility_timeout)),
            responses: Arc::new(MemoryQueue::new(Duration::from_secs(30))),
            results: ResultStore::in_memory(),
            embedder: Arc::new(ScriptedEmbedder {
                probes,
                calls: AtomicUsize::new(0),
            }),
            store: Arc::new(store),
            scratch: tempfile::tempdir().unwrap(),
        }
    }

    pub fn consumer(&self, dead_letters: Option<Arc<MemoryQueue>>) -> JobConsumer {
        self.consumer_with(self.requests.clone(), self.responses.clone(), dead_letters, 5)
    }

    pub fn consumer_with_budget(
        &self,
        dead_letters: Option<Arc<MemoryQueue>>,
        max_receive_count: u32,
    ) -> JobConsumer {
        self.consumer_with(
            self.requests.clone(),
            self.responses.clone(),
            dead_letters,
            max_receive_count,
        )
    }

    pub fn consumer_with_responses(
        &self,
        responses: Arc<dyn JobQueue>,
        dead_letters: Option<Arc<MemoryQueue>>,
    ) -> JobConsumer {
        self.consumer_with(self.requests.clone(), responses, dead_letters, 5)
    }

    pub fn consumer_with_requests(
        &self,
        requests: Arc<dyn JobQueue>,
        dead_letters: Option<Arc<MemoryQueue>>,
    ) -> JobConsumer {
        self.consumer_with(requests, self.responses.clone(), dead_letters, 5)
    }

    pub fn consumer_with(
        &self,
        requests: Arc<dyn JobQueue>,
        responses: Arc<dyn JobQueue>,
        dead_letters: Option<Arc<MemoryQueue>>,
        max_receive_count: u32,
    ) -> JobConsumer {
        let queues = ConsumerQueues {
            requests,
            responses,
            dead_letters: dead_letters.map(|q| q as Arc<dyn JobQueue>),
        };
        JobConsumer::new(
            queues,
            self.results.clone(),
            self.invoker(),
            self.settings(max_receive_count),
        )
    }

    fn invoker(&self) -> InferenceInvoker {
        InferenceInvoker::new(self.embedder.clone(), Matcher::unconditional(self.store.clone()))
    }

    fn settings(&self, max_receive_count: u32) -> ConsumerSettings {
        ConsumerSettings {
            wait_time: Duration::from_millis(10),
            max_receive_count,
            scratch_dir: self.scratch.path().to_path_buf(),
        }
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

pub fn base64_of(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// A small valid PNG, base64-encoded
pub fn png_base64() -> String {
    base64_of(&encode_png(&DynamicImage::new_rgb8(16, 16)).unwrap())
}

pub fn job_body(file_name: &str, image_data: &str) -> String {
    serde_json::json!({ "fileName": file_name, "imageData": image_data }).to_string()
}
