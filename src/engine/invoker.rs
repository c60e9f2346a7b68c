//! Inference invoker - staged image in, nearest identity out

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::embedder::FaceEmbedder;
use super::matcher::{MatchResult, Matcher};
use crate::error::InferenceError;
use crate::utils::image::decode_image;

pub struct InferenceInvoker {
    embedder: Arc<dyn FaceEmbedder>,
    matcher: Matcher,
}

impl InferenceInvoker {
    pub fn new(embedder: Arc<dyn FaceEmbedder>, matcher: Matcher) -> Self {
        Self { embedder, matcher }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Classify the face in the image at `staged_path`
    pub async fn infer(&self, staged_path: &Path) -> Result<MatchResult, InferenceError> {
        self.verify_image(staged_path).await?;

        let probe = self.embedder.detect_and_embed(staged_path).await?;
        let result = self.matcher.find_nearest(&probe)?;

        debug!(
            "Nearest identity for {}: {} (distance {:.4})",
            staged_path.display(),
            result.name,
            result.distance
        );
        Ok(result)
    }

    /// Reject non-image payloads before spending a model call on them
    async fn verify_image(&self, path: &Path) -> Result<(), InferenceError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| InferenceError::StagedRead {
                path: path.to_path_buf(),
                source,
            })?;

        tokio::task::spawn_blocking(move || decode_image(&data).map(|_| ()))
            .await
            .map_err(|e| InferenceError::ImageDecode(e.to_string()))?
            .map_err(|e| InferenceError::ImageDecode(e.to_string()))
    }
}
