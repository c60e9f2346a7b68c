//! Queue-driven face matching worker library

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod service;
pub mod storage;
pub mod utils;

pub use config::Config;
