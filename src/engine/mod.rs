//! Matching engine
//!
//! - Reference embeddings loaded once at startup
//! - Nearest-embedding matching by Euclidean distance
//! - Detect-and-embed capability backed by an external model process

pub mod store;
pub mod matcher;
pub mod embedder;
pub mod invoker;

pub use store::{EmbeddingRecord, EmbeddingStore};
pub use matcher::{MatchResult, Matcher};
pub use embedder::{FaceEmbedder, ProcessEmbedder};
pub use invoker::InferenceInvoker;
