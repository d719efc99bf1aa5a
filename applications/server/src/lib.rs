//! Mastering Server Library
//!
//! HTTP front end and job engine for the two-pass mastering pipeline: requests
//! are resolved into a processing spec, queued on a bounded worker pool, run
//! through the external DSP engine, and delivered to remote or local storage.
//!
//! This library exposes the core components for testing purposes.

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use jobs::{JobInput, MasteringQueue, MasteringRequest};
pub use services::{FfmpegExecutor, FileStorage, JobTracker};
pub use state::AppState;
