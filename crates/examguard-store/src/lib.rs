//! Attempt stores and configuration.
//!
//! Implements the `AttemptSink` trait for an in-memory store and a
//! directory of JSON files, and loads `examguard.toml`.

pub mod config;
pub mod json;
pub mod memory;

pub use config::{
    create_store, load_config, load_config_from, parse_config, ExamguardConfig, ProctoringSection,
    StoreConfig,
};
pub use examguard_core::error::StoreError;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
