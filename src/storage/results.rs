//! Result object store
//!
//! Recognition labels are written as plain-text objects keyed by the job's
//! file name without extension. Writes overwrite, so reprocessing a job after
//! a partial publish replaces the previous object instead of duplicating it.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info};
use url::Url;

use crate::config::AwsConfig;

#[derive(Clone)]
pub struct ResultStore {
    store: Arc<dyn ObjectStore>,
}

impl ResultStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store with no persistence, mostly for tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    /// Build a store from `memory://`, `file:///dir` or `s3://bucket`
    ///
    /// S3 credentials come from the `aws` section when set, otherwise from the
    /// usual `AWS_*` environment variables.
    pub fn from_url(url: &str, aws: &AwsConfig) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("invalid store URL {}", url))?;

        let store: Arc<dyn ObjectStore> = match parsed.scheme() {
            "memory" => Arc::new(InMemory::new()),
            "file" => {
                let dir = parsed
                    .to_file_path()
                    .map_err(|_| anyhow::anyhow!("invalid file URL {}", url))?;
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                Arc::new(LocalFileSystem::new_with_prefix(&dir)?)
            }
            "s3" => {
                let mut builder = AmazonS3Builder::from_env().with_url(url);
                if let Some(region) = &aws.region {
                    builder = builder.with_region(region);
                }
                if let Some(key) = &aws.access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &aws.secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                Arc::new(builder.build().with_context(|| format!("failed to create S3 store for {}", url))?)
            }
            other => bail!("unsupported store scheme {:?} in {}", other, url),
        };

        info!("Result store: {}", url);
        Ok(Self { store })
    }

    /// Write (or overwrite) the label for `key`
    pub async fn put_label(&self, key: &str, label: &str) -> Result<(), object_store::Error> {
        let location = ObjectPath::from(key);
        self.store
            .put(&location, PutPayload::from(label.to_string()))
            .await?;
        debug!("Wrote result object {}", location);
        Ok(())
    }

    /// Read back the label stored under `key`
    pub async fn get_label(&self, key: &str) -> Result<Option<String>, object_store::Error> {
        let location = ObjectPath::from(key);
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        let bytes = result.bytes().await?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
