/// Bounded mastering queue
use crate::jobs::workflow::{JobInput, MasteringWorkflow, QueuedJob};
use crate::services::JobTracker;
use mastering_core::{spec::resolve, MasteringError, MasteringJob, Preset, SpecOverrides};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{Mutex, Notify};

/// A mastering request as accepted from a caller
#[derive(Debug, Clone)]
pub struct MasteringRequest {
    pub input: JobInput,
    pub preset: Option<String>,
    pub overrides: SpecOverrides,
    pub project_name: Option<String>,
    pub track_name: Option<String>,
}

/// FIFO of accepted jobs drained by a fixed number of workers
///
/// At most `workers` jobs run at once, so at most that many DSP processes
/// exist at any time.
pub struct MasteringQueue {
    queue: Mutex<VecDeque<QueuedJob>>,
    ready: Notify,
    workflow: Arc<MasteringWorkflow>,
    tracker: JobTracker,
    default_preset: String,
    workers: usize,
}

impl MasteringQueue {
    pub fn new(
        workflow: Arc<MasteringWorkflow>,
        tracker: JobTracker,
        default_preset: impl Into<String>,
        workers: usize,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            workflow,
            tracker,
            default_preset: default_preset.into(),
            workers: workers.max(1),
        }
    }

    /// Start worker tasks
    pub fn start(self: &Arc<Self>) {
        for worker_id in 0..self.workers {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                tracing::info!("Mastering worker {} started", worker_id);
                queue.worker_loop(worker_id).await;
            });
        }
    }

    /// Resolve and validate settings, register the job, and enqueue it
    ///
    /// # Errors
    /// Invalid settings are rejected before any job is created.
    pub async fn submit(&self, request: MasteringRequest) -> Result<MasteringJob, MasteringError> {
        let preset_name = request.preset.as_deref().unwrap_or(&self.default_preset);
        let preset = Preset::find_or_default(Some(preset_name));
        if !preset.name.eq_ignore_ascii_case(preset_name.trim()) {
            tracing::warn!(
                requested = %preset_name,
                using = %preset.name,
                "Unknown preset, falling back"
            );
        }

        let spec = resolve(Some(preset.name), &request.overrides);
        spec.validate()?;

        let job = self
            .tracker
            .create(request.input.reference(), preset.name, spec)
            .await;

        self.enqueue(QueuedJob {
            job: job.clone(),
            input: request.input,
            project_name: request.project_name,
            track_name: request.track_name,
        })
        .await;

        Ok(job)
    }

    /// Submit and wait for the job to finish
    pub async fn submit_and_wait(
        &self,
        request: MasteringRequest,
    ) -> Result<MasteringJob, MasteringError> {
        let job = self.submit(request).await?;
        self.tracker.wait_for_terminal(&job.id).await
    }

    async fn enqueue(&self, job: QueuedJob) {
        let mut queue = self.queue.lock().await;
        tracing::info!(job_id = %job.job.id, queued = queue.len() + 1, "Enqueued mastering job");
        queue.push_back(job);
        drop(queue);
        self.ready.notify_one();
    }

    /// Worker loop - processes jobs from the queue
    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                queue.pop_front()
            };

            match next {
                Some(queued) => {
                    let job_id = queued.job.id.clone();
                    tracing::info!(job_id = %job_id, "Worker {} processing job", worker_id);
                    self.workflow.run(queued).await;
                    tracing::debug!(job_id = %job_id, "Worker {} done", worker_id);
                }
                None => self.ready.notified().await,
            }
        }
    }

    /// Get queue length
    pub async fn queue_length(&self) -> usize {
        self.queue.lock().await.len()
    }
}
