//! Error taxonomy for the worker pipeline
//!
//! Each pipeline stage has its own error type. [`JobError`] wraps them at the
//! consumer boundary and decides whether a failure is permanent (the job can
//! never succeed) or transient (a redelivery may succeed).

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load the embedding store at startup
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to read embeddings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed embeddings file {path}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("embeddings file lists {names} names but {vectors} vectors")]
    LengthMismatch { names: usize, vectors: usize },

    #[error("embedding {index} has dimension {found}, expected {expected}")]
    InconsistentDimension {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("embeddings file {path} contains no records")]
    Empty { path: PathBuf },
}

/// Nearest-embedding lookup failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("embedding store is empty")]
    EmptyStore,

    #[error("probe has dimension {found}, store expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Failure of the detect-and-embed step
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no face detected in image")]
    NoFaceDetected,

    #[error("image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("failed to read staged image {path}")]
    StagedRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding process failed (exit code {exit_code:?}): {output}")]
    ExternalProcess {
        exit_code: Option<i32>,
        output: String,
    },

    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Failure to turn a queue message into a staged file
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("malformed job message: {0}")]
    MalformedJob(#[source] serde_json::Error),

    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error("image payload is not valid base64")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to write staged file")]
    Io(#[from] std::io::Error),
}

/// Queue service failure
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("unknown or expired receipt handle {0}")]
    InvalidReceipt(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Unavailable(err.to_string())
    }
}

/// Failure while writing the result to the object store or response queue
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write result object {key}")]
    Store {
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("failed to send response message")]
    Queue(#[source] QueueError),

    #[error("failed to encode response message")]
    Encode(#[from] serde_json::Error),
}

/// Any failure of a single processing cycle
#[derive(Debug, Error)]
pub enum JobError {
    #[error("polling failed: {0}")]
    Poll(#[source] QueueError),

    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),

    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] QueueError),

    #[error("dead-letter routing failed: {0}")]
    DeadLetter(#[source] PublishError),
}

impl JobError {
    /// True when retrying the same message can never succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            JobError::Staging(err) => !matches!(err, StagingError::Io(_)),
            JobError::Inference(err) => matches!(
                err,
                InferenceError::NoFaceDetected
                    | InferenceError::ImageDecode(_)
                    | InferenceError::Match(MatchError::DimensionMismatch { .. })
            ),
            _ => false,
        }
    }
}
