//! Face detection + embedding capability
//!
//! The model itself lives outside this crate. [`ProcessEmbedder`] runs it as a
//! child process that receives the image path as its last argument and prints
//! the embedding of the detected face to stdout as a JSON array of numbers.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::error::InferenceError;

/// Produces exactly one embedding for the face in an image
#[async_trait]
pub trait FaceEmbedder: Send + Sync + 'static {
    async fn detect_and_embed(&self, image_path: &Path) -> Result<Vec<f32>, InferenceError>;
}

/// Embedder backed by an external program
pub struct ProcessEmbedder {
    program: String,
    args: Vec<String>,
    no_face_exit_code: Option<i32>,
}

impl ProcessEmbedder {
    pub fn new(program: impl Into<String>, args: Vec<String>, no_face_exit_code: Option<i32>) -> Self {
        Self {
            program: program.into(),
            args,
            no_face_exit_code,
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.no_face_exit_code,
        )
    }
}

#[async_trait]
impl FaceEmbedder for ProcessEmbedder {
    async fn detect_and_embed(&self, image_path: &Path) -> Result<Vec<f32>, InferenceError> {
        let start = Instant::now();

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| InferenceError::ExternalProcess {
                exit_code: None,
                output: format!("failed to start {}: {}", self.program, e),
            })?;

        debug!(
            "Embedding process for {} finished in {}ms",
            image_path.display(),
            start.elapsed().as_millis()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let code = output.status.code();
            if code.is_some() && code == self.no_face_exit_code {
                return Err(InferenceError::NoFaceDetected);
            }
            return Err(InferenceError::ExternalProcess {
                exit_code: code,
                output: format!("{}{}", stderr.trim(), stdout.trim()),
            });
        }

        parse_embedding(stdout.trim())
    }
}

/// Parse the embedder's stdout; `null` or an empty array means no face
pub fn parse_embedding(stdout: &str) -> Result<Vec<f32>, InferenceError> {
    let parsed: Option<Vec<f32>> =
        serde_json::from_str(stdout).map_err(|e| InferenceError::ExternalProcess {
            exit_code: Some(0),
            output: format!("unparseable embedding output ({}): {}", e, truncate(stdout, 200)),
        })?;

    match parsed {
        Some(vector) if !vector.is_empty() => Ok(vector),
        _ => Err(InferenceError::NoFaceDetected),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
