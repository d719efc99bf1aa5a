/// Shared application state
use crate::{
    config::ServerConfig,
    error::Result,
    jobs::{MasteringQueue, MasteringWorkflow},
    services::{
        ArtifactDelivery, DspExecutor, FfmpegExecutor, FileStorage, HttpObjectStorage,
        JobTracker, RemoteStorage, SourceFetcher,
    },
};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<MasteringQueue>,
    pub tracker: JobTracker,
    pub file_storage: Arc<FileStorage>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire up the engine with FFmpeg and, when configured, remote storage
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let executor = Arc::new(FfmpegExecutor::new(
            config.engine.ffmpeg_path.clone(),
            config.engine.timeout(),
        ));

        let remote = match &config.storage.remote {
            Some(settings) => {
                let storage: Arc<dyn RemoteStorage> = Arc::new(HttpObjectStorage::new(settings)?);
                tracing::info!(endpoint = %settings.endpoint, "Remote storage enabled");
                Some(storage)
            }
            None => None,
        };

        Self::build(config, executor, remote).await
    }

    /// Initialize storage, start the worker pool, and assemble the state
    ///
    /// Must run inside a Tokio runtime; workers are spawned immediately.
    pub async fn build(
        config: ServerConfig,
        executor: Arc<dyn DspExecutor>,
        remote: Option<Arc<dyn RemoteStorage>>,
    ) -> Result<Self> {
        let file_storage = FileStorage::new(
            config.storage.temp_dir.clone(),
            config.storage.output_dir.clone(),
        );
        file_storage.initialize().await?;
        let file_storage = Arc::new(file_storage);
        tracing::info!(
            temp_dir = %file_storage.temp_dir().display(),
            output_dir = %file_storage.output_dir().display(),
            "File storage initialized"
        );

        let tracker = JobTracker::with_retention(config.engine.retained_jobs);
        let fetcher = SourceFetcher::new(
            config.engine.fetch_timeout(),
            u64::try_from(config.server.max_upload_bytes()).unwrap_or(u64::MAX),
        )?;
        let delivery = Arc::new(ArtifactDelivery::new(
            Arc::clone(&file_storage),
            remote,
            config.server.public_base_url.clone(),
        ));
        let workflow = Arc::new(MasteringWorkflow::new(
            executor,
            tracker.clone(),
            Arc::clone(&file_storage),
            delivery,
            fetcher,
        ));

        let queue = Arc::new(MasteringQueue::new(
            workflow,
            tracker.clone(),
            config.engine.default_preset.clone(),
            config.engine.workers,
        ));
        queue.start();
        tracing::info!("Mastering queue started with {} workers", config.engine.workers);

        Ok(Self {
            queue,
            tracker,
            file_storage,
            config: Arc::new(config),
        })
    }
}
