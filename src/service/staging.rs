//! Scoped on-disk staging of job payloads
//!
//! Each job gets its own directory under the scratch root, so two jobs with the
//! same file name never collide and leftovers from an earlier cycle cannot be
//! picked up. The directory is removed when the [`StagedFile`] is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::types::result_key;
use crate::error::StagingError;

#[derive(Debug)]
pub struct StagedFile {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl StagedFile {
    /// Write `data` to `<scratch_root>/job-XXXX/<file_name>`
    pub fn create(scratch_root: &Path, file_name: &str, data: &[u8]) -> Result<Self, StagingError> {
        result_key(file_name)?;

        let dir = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(scratch_root)?;
        let path = dir.path().join(file_name);

        let mut file = std::fs::File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()?;

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged data now, reporting failures that drop would swallow
    pub fn close(mut self) -> std::io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}
