//! Worker configuration
//!
//! Values are layered: built-in defaults, then `config.toml` (or the file named
//! by `FACEMATCH_CONFIG`), then `FACEMATCH_*` environment variables using `__`
//! between section and key, e.g. `FACEMATCH_QUEUE__REQUEST_QUEUE`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub aws: AwsConfig,
    pub inference: InferenceConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// SQLite database holding all queues
    pub database_path: PathBuf,
    pub request_queue: String,
    pub response_queue: String,
    pub dead_letter_queue: Option<String>,
    /// Long-poll wait per receive
    pub wait_time_secs: u64,
    pub visibility_timeout_secs: u64,
    /// Deliveries after which a failing job is dead-lettered
    pub max_receive_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `memory://`, `file:///path` or `s3://bucket`
    pub output_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub program: String,
    pub args: Vec<String>,
    pub no_face_exit_code: Option<i32>,
    pub embeddings_path: PathBuf,
    pub max_distance: Option<f32>,
    pub unknown_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub scratch_dir: PathBuf,
    pub idle_pause_secs: u64,
    pub error_pause_secs: u64,
    pub max_error_pause_secs: u64,
}

impl QueueConfig {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }
}

impl Config {
    /// Load from `path` layered over defaults and the environment
    pub fn load(path: &str) -> Result<Self> {
        Self::figment(path)
            .extract()
            .with_context(|| format!("invalid configuration (file: {})", path))
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("FACEMATCH_").ignore(&["CONFIG"]).split("__"))
    }

    pub fn default_path() -> String {
        std::env::var("FACEMATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig {
                database_path: PathBuf::from("data/queue.db"),
                request_queue: "request-queue".to_string(),
                response_queue: "response-queue".to_string(),
                dead_letter_queue: None,
                wait_time_secs: 19,
                visibility_timeout_secs: 60,
                max_receive_count: 5,
            },
            storage: StorageConfig {
                output_url: "file:///var/lib/facematch/output".to_string(),
            },
            aws: AwsConfig {
                region: Some("ap-northeast-2".to_string()),
                access_key_id: None,
                secret_access_key: None,
            },
            inference: InferenceConfig {
                program: "python3".to_string(),
                args: vec!["model/embed.py".to_string()],
                no_face_exit_code: Some(2),
                embeddings_path: PathBuf::from("model/embeddings.json"),
                max_distance: None,
                unknown_label: "unknown".to_string(),
            },
            worker: WorkerConfig {
                scratch_dir: PathBuf::from("app/temp"),
                idle_pause_secs: 15,
                error_pause_secs: 15,
                max_error_pause_secs: 240,
            },
        }
    }
}
