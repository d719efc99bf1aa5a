/// Two-pass mastering workflow
///
/// ANALYZE_INPUT -> BUILD_CHAIN -> EXECUTE -> ANALYZE_OUTPUT -> FINALIZE
use crate::services::{
    artifact_delivery::output_filename, ArtifactDelivery, DspExecutor, FileStorage, JobFiles,
    JobTracker, ProcessRequest, SourceFetcher,
};
use bytes::Bytes;
use mastering_core::{
    chain::synthesize,
    report::{scan_report, ParsedReport},
    CompletedOutput, LoudnessMetrics, MasteringError, MasteringJob, Preset,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Where a job's audio comes from
#[derive(Debug, Clone)]
pub enum JobInput {
    /// Bytes uploaded with the request
    Upload { filename: String, data: Bytes },
    /// Recording fetched over HTTP before processing
    SourceUrl(String),
    /// File already on this machine (CLI)
    LocalFile(PathBuf),
}

impl JobInput {
    /// Human-readable reference stored on the job
    pub fn reference(&self) -> String {
        match self {
            JobInput::Upload { filename, .. } => filename.clone(),
            JobInput::SourceUrl(url) => url.clone(),
            JobInput::LocalFile(path) => path.display().to_string(),
        }
    }

    fn extension(&self) -> String {
        let name = match self {
            JobInput::Upload { filename, .. } => filename.clone(),
            JobInput::SourceUrl(url) => reqwest::Url::parse(url)
                .map(|u| u.path().to_string())
                .unwrap_or_default(),
            JobInput::LocalFile(path) => path.display().to_string(),
        };
        Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_string()
    }
}

/// Everything a worker needs to run one accepted job
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub job: MasteringJob,
    pub input: JobInput,
    pub project_name: Option<String>,
    pub track_name: Option<String>,
}

pub struct MasteringWorkflow {
    executor: Arc<dyn DspExecutor>,
    tracker: JobTracker,
    file_storage: Arc<FileStorage>,
    delivery: Arc<ArtifactDelivery>,
    fetcher: SourceFetcher,
}

impl MasteringWorkflow {
    pub fn new(
        executor: Arc<dyn DspExecutor>,
        tracker: JobTracker,
        file_storage: Arc<FileStorage>,
        delivery: Arc<ArtifactDelivery>,
        fetcher: SourceFetcher,
    ) -> Self {
        Self {
            executor,
            tracker,
            file_storage,
            delivery,
            fetcher,
        }
    }

    /// Drive one job to a terminal state
    ///
    /// Every failure ends up on the job record. Temp files are removed on all
    /// paths before the terminal state is published.
    pub async fn run(&self, queued: QueuedJob) {
        let job_id = queued.job.id.clone();
        let files = self.file_storage.job_files(
            &job_id,
            &queued.input.extension(),
            queued.job.resolved_spec.output_format,
        );

        let outcome = self.process_job(&queued, &files).await;
        drop(files);

        match outcome {
            Ok(output) => {
                if let Err(e) = self.tracker.mark_completed(&job_id, output).await {
                    tracing::error!(job_id = %job_id, "Could not record completion: {}", e);
                }
            }
            Err(e) => self.fail(&queued.job, &e).await,
        }
    }

    async fn process_job(
        &self,
        queued: &QueuedJob,
        files: &JobFiles,
    ) -> Result<CompletedOutput, MasteringError> {
        self.stage_input(&queued.input, files).await?;
        self.tracker.mark_processing(&queued.job.id).await?;
        self.execute(queued, files).await
    }

    async fn execute(
        &self,
        queued: &QueuedJob,
        files: &JobFiles,
    ) -> Result<CompletedOutput, MasteringError> {
        let job = &queued.job;
        let spec = &job.resolved_spec;
        let started = Instant::now();
        let mut notes = Vec::new();

        if let Some(preset) = Preset::find(&job.preset_used) {
            notes.push(preset.description.to_string());
        }
        notes.extend(spec.advisories());

        // ANALYZE_INPUT
        let input_metrics = match self.executor.analyze(&files.input).await {
            Ok(text) => Some(metrics_or_defaults(&job.id, "input", &scan_report(&text))),
            Err(e) => {
                tracing::warn!(job_id = %job.id, "Input analysis failed, continuing: {}", e);
                notes.push("Input loudness analysis was unavailable".to_string());
                None
            }
        };

        // BUILD_CHAIN
        let chain = synthesize(spec);
        tracing::info!(
            job_id = %job.id,
            stages = ?chain.stage_names(),
            "Built filter chain"
        );

        // EXECUTE
        self.executor
            .process(ProcessRequest {
                input: &files.input,
                output: &files.output,
                chain: &chain,
                format: spec.output_format,
                bitrate_kbps: spec.output_bitrate_kbps,
            })
            .await?;

        if !tokio::fs::try_exists(&files.output).await.unwrap_or(false) {
            return Err(MasteringError::execution(
                "DSP engine reported success but wrote no output",
            ));
        }

        // ANALYZE_OUTPUT
        let output_metrics = match self.executor.analyze(&files.output).await {
            Ok(text) => metrics_or_defaults(&job.id, "output", &scan_report(&text)),
            Err(e) => {
                tracing::warn!(job_id = %job.id, "Output analysis failed, using defaults: {}", e);
                LoudnessMetrics::default()
            }
        };

        // FINALIZE
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let filename = output_filename(
            &job.id,
            queued.project_name.as_deref(),
            queued.track_name.as_deref(),
            spec.output_format,
        );
        let artifact_ref = self.delivery.deliver(&files.output, &filename).await?;

        tracing::info!(
            job_id = %job.id,
            lufs = output_metrics.integrated_loudness_lufs,
            true_peak = output_metrics.true_peak_db,
            processing_time_ms,
            "Mastering finished"
        );

        Ok(CompletedOutput {
            output_metrics,
            artifact_ref,
            input_metrics,
            processing_time_ms,
            notes,
        })
    }

    async fn stage_input(&self, input: &JobInput, files: &JobFiles) -> Result<(), MasteringError> {
        match input {
            JobInput::Upload { data, .. } => self.file_storage.store_input(files, data).await,
            JobInput::SourceUrl(url) => {
                let data = self.fetcher.fetch(url).await?;
                self.file_storage.store_input(files, &data).await
            }
            JobInput::LocalFile(path) => {
                tokio::fs::copy(path, &files.input).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        MasteringError::not_found("Source recording", path.display().to_string())
                    } else {
                        MasteringError::Io(e)
                    }
                })?;
                Ok(())
            }
        }
    }

    async fn fail(&self, job: &MasteringJob, error: &MasteringError) {
        let message = match error {
            MasteringError::Execution(msg) => {
                tracing::error!(job_id = %job.id, "DSP engine failed: {}", msg);
                msg.clone()
            }
            other => {
                tracing::warn!(job_id = %job.id, "Job failed: {}", other);
                other.to_string()
            }
        };
        if let Err(e) = self.tracker.mark_failed(&job.id, &message).await {
            tracing::error!(job_id = %job.id, "Could not record failure: {}", e);
        }
    }
}

fn metrics_or_defaults(
    job_id: &mastering_core::JobId,
    pass: &str,
    report: &ParsedReport,
) -> LoudnessMetrics {
    report.complete().unwrap_or_else(|e| {
        tracing::warn!(
            job_id = %job_id,
            pass,
            "{}, using defaults for missing fields",
            e
        );
        report.with_defaults()
    })
}
