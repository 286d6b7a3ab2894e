//! kanjiquiz-store — Collaborator implementations for the quiz engine.
//!
//! Provides an in-memory store that generates quizzes and keeps answer
//! statistics, a scriptable mock for tests, and settings loading.

pub mod config;
pub mod error;
mod generator;
pub mod memory;
pub mod mock;

pub use config::{load_settings, load_settings_from, Settings};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use mock::MockStore;
