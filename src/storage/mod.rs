//! Storage module for recognition results

pub mod results;

pub use results::ResultStore;
