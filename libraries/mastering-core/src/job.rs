//! Mastering job record and lifecycle
//!
//! ```text
//! pending ──► processing ──► completed
//!    │             │
//!    └─────────────┴───────► failed
//! ```
//!
//! `completed` and `failed` are terminal: every transition method refuses to
//! touch a job that has reached one of them.

use crate::error::{MasteringError, Result};
use crate::report::LoudnessMetrics;
use crate::spec::ProcessingSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Mastering job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create a job ID from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random job ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    Pending,
    /// The DSP engine is running
    Processing,
    /// Master delivered
    Completed,
    /// Processing failed; see the error message
    Failed,
}

impl JobStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Coarse progress percentage for status polling
    pub fn progress(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 50,
            Self::Completed | Self::Failed => 100,
        }
    }

    fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one mastering request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteringJob {
    /// Job identifier
    pub id: JobId,
    /// Where the input came from (upload name or source URL)
    pub input_ref: String,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the request was accepted
    pub created_at: DateTime<Utc>,
    /// When the DSP engine was first invoked
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Name of the preset the spec was seeded from
    pub preset_used: String,
    /// Settings the job runs with
    pub resolved_spec: ProcessingSpec,
    /// Measurements of the input, when analysis succeeded
    pub input_metrics: Option<LoudnessMetrics>,
    /// Measurements of the delivered master
    pub output_metrics: Option<LoudnessMetrics>,
    /// Download reference of the delivered master
    pub output_artifact_ref: Option<String>,
    /// Human-readable failure reason
    pub error_message: Option<String>,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: Option<u64>,
    /// Informational remarks collected during processing
    pub notes: Vec<String>,
}

/// Data recorded when a job completes
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedOutput {
    /// Measurements of the delivered master
    pub output_metrics: LoudnessMetrics,
    /// Download reference
    pub artifact_ref: String,
    /// Measurements of the input, if analysis succeeded
    pub input_metrics: Option<LoudnessMetrics>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
    /// Extra remarks to append
    pub notes: Vec<String>,
}

impl MasteringJob {
    /// Create a new job in the `pending` state
    pub fn new(
        input_ref: impl Into<String>,
        preset_used: impl Into<String>,
        resolved_spec: ProcessingSpec,
    ) -> Self {
        Self {
            id: JobId::generate(),
            input_ref: input_ref.into(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            preset_used: preset_used.into(),
            resolved_spec,
            input_metrics: None,
            output_metrics: None,
            output_artifact_ref: None,
            error_message: None,
            processing_time_ms: None,
            notes: Vec::new(),
        }
    }

    /// Whether the job reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `processing`
    ///
    /// # Errors
    /// Fails unless the job is `pending`.
    pub fn start(&mut self) -> Result<()> {
        self.transition(JobStatus::Processing)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `completed` and record the results
    ///
    /// # Errors
    /// Fails unless the job is `processing`.
    pub fn complete(&mut self, output: CompletedOutput) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.output_metrics = Some(output.output_metrics);
        self.output_artifact_ref = Some(output.artifact_ref);
        self.input_metrics = output.input_metrics;
        self.processing_time_ms = Some(output.processing_time_ms);
        self.notes.extend(output.notes);
        Ok(())
    }

    /// Move to `failed` with a reason
    ///
    /// # Errors
    /// Fails if the job is already terminal.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.processing_time_ms = Some(elapsed_ms(started, now));
        }
        let message = error_message.into();
        self.error_message = Some(if message.trim().is_empty() {
            "Processing failed".to_string()
        } else {
            message
        });
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(MasteringError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}
