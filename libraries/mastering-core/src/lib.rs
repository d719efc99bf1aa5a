//! Mastering Core
//!
//! Platform-agnostic domain logic for the offline mastering engine.
//!
//! This crate provides:
//! - Built-in mastering presets (`streaming`, `club`, `broadcast`, `cd`, `loud`, `vinyl`)
//! - Resolution of a preset plus caller overrides into a [`ProcessingSpec`]
//! - Synthesis of the ordered DSP [`FilterChain`] for a spec
//! - Parsing of the DSP engine's loudness diagnostics into [`LoudnessMetrics`]
//! - The [`MasteringJob`] record and its lifecycle rules
//!
//! Nothing in here touches the filesystem or spawns processes; the server
//! application drives the external engine and feeds its output back in.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────────┐   ┌─────────────┐
//! │ Preset + │ ─►│  resolve  │ ─►│ ProcessingSpec │ ─►│ synthesize  │ ─► FilterChain
//! │ Overrides│   └───────────┘   └────────────────┘   └─────────────┘
//! └──────────┘
//!
//! engine diagnostics ─► parse_loudness_report ─► LoudnessMetrics
//! ```
//!
//! # Example
//!
//! ```rust
//! use mastering_core::{chain, spec, SpecOverrides};
//!
//! let overrides = SpecOverrides {
//!     warmth_db: Some(1.5),
//!     ..SpecOverrides::default()
//! };
//! let resolved = spec::resolve(Some("vinyl"), &overrides);
//! resolved.validate().unwrap();
//!
//! let chain = chain::synthesize(&resolved);
//! assert!(chain.to_filtergraph().ends_with("level=disabled"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod error;
pub mod job;
pub mod preset;
pub mod report;
pub mod spec;

pub use chain::{FilterChain, FilterStage};
pub use error::{MasteringError, Result};
pub use job::{CompletedOutput, JobId, JobStatus, MasteringJob};
pub use preset::{Preset, PRESETS};
pub use report::{parse_loudness_report, LoudnessMetrics};
pub use spec::{
    CompressorOverrides, CompressorSettings, OutputFormat, ProcessingSpec, SpecOverrides,
};

/// Preset used when the caller names none, or names one that does not exist
pub const DEFAULT_PRESET: &str = "streaming";

/// Lower edge of the conventional mastering loudness window (LUFS)
pub const CONVENTIONAL_LOUDNESS_MIN_LUFS: f64 = -24.0;

/// Upper edge of the conventional mastering loudness window (LUFS)
pub const CONVENTIONAL_LOUDNESS_MAX_LUFS: f64 = -6.0;
