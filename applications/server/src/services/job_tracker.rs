/// Job state tracker - owns every mastering job record
use mastering_core::{
    job::CompletedOutput, JobId, JobStatus, MasteringError, MasteringJob, ProcessingSpec,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the transition event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Records kept by [`JobTracker::new`]
const DEFAULT_RETAINED_JOBS: usize = 1000;

type Result<T> = std::result::Result<T, MasteringError>;

/// Published on every status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// In-memory job registry
///
/// Records are only mutated under the write lock, so readers always get a
/// complete snapshot. Callers receive clones and cannot change the stored job.
///
/// Once `retained_jobs` records exist, each new job evicts the longest-finished
/// terminal job. Pending and processing jobs are never evicted.
#[derive(Debug, Clone)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<JobId, MasteringJob>>>,
    events: broadcast::Sender<JobEvent>,
    retained_jobs: usize,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }

    pub fn with_retention(retained_jobs: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            events,
            retained_jobs: retained_jobs.max(1),
        }
    }

    /// Register a new job in the `pending` state
    pub async fn create(
        &self,
        input_ref: impl Into<String>,
        preset_used: impl Into<String>,
        resolved_spec: ProcessingSpec,
    ) -> MasteringJob {
        let job = MasteringJob::new(input_ref, preset_used, resolved_spec);
        {
            let mut jobs = self.jobs.write().await;
            self.evict_finished(&mut jobs);
            jobs.insert(job.id.clone(), job.clone());
        }
        tracing::info!(job_id = %job.id, preset = %job.preset_used, "Job created");
        self.publish(&job);
        job
    }

    pub async fn mark_processing(&self, id: &JobId) -> Result<MasteringJob> {
        self.update(id, MasteringJob::start).await
    }

    pub async fn mark_completed(&self, id: &JobId, output: CompletedOutput) -> Result<MasteringJob> {
        self.update(id, |job| job.complete(output)).await
    }

    pub async fn mark_failed(&self, id: &JobId, error_message: &str) -> Result<MasteringJob> {
        self.update(id, |job| job.fail(error_message)).await
    }

    /// Snapshot of a job
    pub async fn get(&self, id: &JobId) -> Result<MasteringJob> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MasteringError::not_found("Job", id.as_str()))
    }

    /// Number of tracked jobs per status
    pub async fn counts(&self) -> HashMap<JobStatus, usize> {
        let jobs = self.jobs.read().await;
        let mut counts = HashMap::new();
        for job in jobs.values() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }

    /// Receive an event for every subsequent transition
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Wait until the job reaches `completed` or `failed`
    pub async fn wait_for_terminal(&self, id: &JobId) -> Result<MasteringJob> {
        // Subscribe before checking so a transition in between is not missed.
        let mut events = self.subscribe();
        loop {
            let job = self.get(id).await?;
            if job.is_terminal() {
                return Ok(job);
            }

            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(MasteringError::execution("Job tracker shut down"));
                }
            }
        }
    }

    async fn update<F>(&self, id: &JobId, apply: F) -> Result<MasteringJob>
    where
        F: FnOnce(&mut MasteringJob) -> Result<()>,
    {
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| MasteringError::not_found("Job", id.as_str()))?;
            apply(job)?;
            job.clone()
        };

        tracing::debug!(job_id = %id, status = %snapshot.status, "Job status changed");
        self.publish(&snapshot);
        Ok(snapshot)
    }

    /// Make room for one more record by dropping the oldest finished jobs
    fn evict_finished(&self, jobs: &mut HashMap<JobId, MasteringJob>) {
        if jobs.len() < self.retained_jobs {
            return;
        }

        let mut finished: Vec<_> = jobs
            .values()
            .filter(|job| job.is_terminal())
            .map(|job| (job.completed_at.unwrap_or(job.created_at), job.id.clone()))
            .collect();
        finished.sort_by_key(|(finished_at, _)| *finished_at);

        let excess = jobs.len() + 1 - self.retained_jobs;
        for (_, id) in finished.into_iter().take(excess) {
            jobs.remove(&id);
            tracing::debug!(job_id = %id, "Evicted finished job");
        }
    }

    fn publish(&self, job: &MasteringJob) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            job_id: job.id.clone(),
            status: job.status,
        });
    }
}
